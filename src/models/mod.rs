//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos del núcleo de sesión:
//! vehículos y unidades, reservas, telemetría y estado del ride.

pub mod reservation;
pub mod ride;
pub mod telemetry;
pub mod vehicle;

pub use reservation::*;
pub use ride::*;
pub use telemetry::*;
pub use vehicle::*;
