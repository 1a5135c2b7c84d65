//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores y otras
//! funcionalidades comunes del núcleo.

pub mod errors;
pub mod logging;

pub use errors::*;
