//! Configuración del núcleo de sesión

pub mod environment;

pub use environment::EnvironmentConfig;
