//! Núcleo de sesión en tiempo real para el alquiler de coches RC
//!
//! Este crate contiene la parte con ingeniería real del cliente móvil:
//! el ciclo de vida de la reserva (claim exclusivo y acotado en el
//! tiempo sobre una unidad física), el transporte en tiempo real con
//! reconexión, y el loop de medición y facturación por minuto con
//! parada forzada al agotarse el saldo. Las pantallas, la navegación y
//! el resto del plumbing REST viven fuera; aquí solo están sus
//! contratos como traits inyectables.

pub mod config;
pub mod metering;
pub mod models;
pub mod reservation;
pub mod services;
pub mod session;
pub mod transport;
pub mod utils;

pub use config::EnvironmentConfig;
pub use metering::{MeterEvent, MeteringEngine};
pub use models::*;
pub use reservation::{ReservationEvent, ReservationManager};
pub use services::{
    BalanceApi, DeductOutcome, HttpBalanceService, HttpLevelService, HttpReservationService,
    HttpVehicleService, ReservationApi, UserLevelApi, VehicleApi,
};
pub use session::{EntryReport, SessionOrchestrator};
pub use transport::{
    ConnectConfig, ConnectionState, LinkSession, MockPeer, MockVehicleLink, RealtimeTransport,
    SignalMessage, TransportEvent, VehicleLink, WsVehicleLink,
};
pub use utils::errors::CoreError;
