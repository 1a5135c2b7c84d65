//! Máquina de estados de la conexión en tiempo real
//!
//! Las transiciones las conduce únicamente el transporte; el resto de
//! componentes tratan el estado como solo-lectura.

use serde::{Deserialize, Serialize};

/// Estado de la conexión con el vehículo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// Transiciones válidas de la máquina:
    /// `disconnected → connecting → connected → {reconnecting → connected | failed}`.
    /// `disconnect()` lleva a `disconnected` desde cualquier estado.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            // disconnect() es incondicional
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) | (Connecting, Failed) => true,
            (Connected, Reconnecting) | (Connected, Failed) => true,
            (Reconnecting, Connected) | (Reconnecting, Failed) => true,
            _ => false,
        }
    }

    /// `failed` es terminal dentro de un intento de sesión
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed)
    }

    /// Hay una sesión en curso (conectando, conectada o recuperándose)
    pub fn is_session_live(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}
