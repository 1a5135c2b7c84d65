//! Inicialización del logging
//!
//! El crate emite trazas por `tracing` en los módulos internos y por el
//! facade `log` en los clientes HTTP; el suscriptor de `tracing` recoge
//! ambos. La aplicación anfitriona llama a uno de estos inicializadores
//! una sola vez al arrancar.

/// Configurar el suscriptor de tracing de la aplicación
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();
}

/// Logging plano controlado por `RUST_LOG`, para herramientas y demos
pub fn init_env_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
