//! Medición y facturación del ride

pub mod engine;

pub use engine::{MeterEvent, MeteringEngine};
