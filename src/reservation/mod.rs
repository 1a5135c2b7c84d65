//! Gestión de reservas

pub mod manager;

pub use manager::{ReservationEvent, ReservationManager};
