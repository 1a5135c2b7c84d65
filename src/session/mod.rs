//! Orquestación de la sesión de control

pub mod orchestrator;

pub use orchestrator::{EntryReport, SessionOrchestrator};
