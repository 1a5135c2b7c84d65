//! Transporte en tiempo real
//!
//! Este módulo contiene la sesión de control/telemetría con el
//! vehículo: máquina de estados de conexión, eventos, señalización
//! WebSocket y las dos estrategias de enlace (real y simulada).

pub mod events;
pub mod link;
pub mod mock;
pub mod signaling;
pub mod state;
#[allow(clippy::module_inception)]
pub mod transport;

pub use events::TransportEvent;
pub use link::{ConnectConfig, LinkSession, VehicleLink};
pub use mock::{MockPeer, MockVehicleLink};
pub use signaling::{SignalMessage, WsVehicleLink};
pub use state::ConnectionState;
pub use transport::RealtimeTransport;
