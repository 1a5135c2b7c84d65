//! Services module
//!
//! Este módulo contiene los clientes de los colaboradores externos del
//! núcleo: catálogo de vehículos, monedero, reservas y nivel de usuario.
//! Cada colaborador se expone como trait para poder inyectar mocks en
//! las pruebas del orquestador y del motor de facturación.

pub mod balance_service;
pub mod level_service;
pub mod reservation_service;
pub mod vehicle_service;

pub use balance_service::*;
pub use level_service::*;
pub use reservation_service::*;
pub use vehicle_service::*;
