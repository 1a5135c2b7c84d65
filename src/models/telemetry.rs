//! Modelos de telemetría y comandos de control
//!
//! Este módulo define los frames JSON que viajan por el canal de datos
//! hacia y desde el vehículo, más los mensajes de señalización SDP/ICE.
//! Un frame de telemetría entrante reemplaza por completo al anterior;
//! nunca se mezclan frames parciales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame de telemetría del vehículo (transitorio, no se persiste)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub speed_kph: f64,
    pub battery_pct: f64,
    pub lat: f64,
    pub lon: f64,
    /// Vector de orientación [x, y, z]
    pub orientation: [f64; 3],
    pub temperature_c: f64,
    pub timestamp: DateTime<Utc>,
}

/// Comando de control saliente - fire and forget, sin ACK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlPayload {
    /// Entrada del joystick normalizada a [-1.0, 1.0] en cada eje
    Movement { x: f64, y: f64 },
    /// Límite de velocidad solicitado
    Speed { limit: u32 },
    Light { on: bool },
    Horn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    #[serde(flatten)]
    pub payload: ControlPayload,
    pub timestamp: DateTime<Utc>,
}

impl ControlCommand {
    pub fn now(payload: ControlPayload) -> Self {
        Self { payload, timestamp: Utc::now() }
    }
}

/// Mensaje JSON del canal de datos peer: `{type, payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ChannelMessage {
    Control(ControlCommand),
    Telemetry(TelemetryFrame),
    /// Anuncio de estado del vehículo (p.ej. stream de video disponible)
    Status(StatusPayload),
    Heartbeat,
}

/// Payload del mensaje de status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub kind: String,
    /// Identificador del stream de media remoto, cuando aplica
    pub stream_id: Option<String>,
}

/// Descriptor opaco del stream de media remoto entregado a la UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub stream_id: String,
    pub vehicle_id: String,
}
