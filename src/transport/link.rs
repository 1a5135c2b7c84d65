//! Estrategia de enlace con el vehículo
//!
//! `VehicleLink` es la costura inyectable entre el transporte y el medio
//! físico: la implementación real abre la señalización WebSocket y el
//! canal de datos; la de pruebas (`MockVehicleLink`) entrega canales en
//! memoria. El transporte solo conoce este contrato.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::ChannelMessage;
use crate::utils::errors::CoreError;

/// Parámetros de conexión hacia un vehículo concreto
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub vehicle_id: Uuid,
    pub signaling_url: String,
    pub ice_servers: Vec<String>,
}

/// Sesión de enlace abierta: canal de frames entrantes y salientes.
///
/// La sesión termina cuando `incoming` queda cerrado; esa es la señal de
/// pérdida de vida del enlace (la detección concreta queda del lado de
/// la implementación, igual que el peer connection subyacente).
pub struct LinkSession {
    pub incoming: mpsc::UnboundedReceiver<ChannelMessage>,
    pub outgoing: mpsc::UnboundedSender<ChannelMessage>,
}

/// Estrategia de enlace con el vehículo
#[async_trait]
pub trait VehicleLink: Send + Sync {
    /// Abrir una sesión de enlace hacia el vehículo indicado.
    ///
    /// Los errores previos a la conexión (señalización caída, handshake
    /// rechazado) se devuelven aquí; las caídas posteriores se observan
    /// como cierre del canal `incoming`.
    async fn open(&self, config: &ConnectConfig) -> Result<LinkSession, CoreError>;
}
