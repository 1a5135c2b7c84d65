//! Eventos del transporte en tiempo real
//!
//! Unión etiquetada con el conjunto cerrado de notificaciones que emite
//! el transporte; los consumidores se suscriben, nunca hacen polling.

use crate::models::{MediaStreamInfo, TelemetryFrame};
use crate::transport::state::ConnectionState;

/// Evento emitido por el transporte hacia sus suscriptores
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Cambio de estado de la conexión
    StateChanged(ConnectionState),
    /// El vehículo anunció su stream de media remoto
    RemoteStream(MediaStreamInfo),
    /// Frame de telemetría entrante (reemplaza al anterior por completo)
    Telemetry(TelemetryFrame),
    /// Error post-conexión; alimenta la máquina de reconexión, no un Result
    Error(String),
    /// Señal terminal: se agotaron los intentos de reconexión
    ReconnectFailed,
}
