//! Señalización WebSocket hacia el vehículo
//!
//! Este módulo contiene el framing de los mensajes de señalización
//! (offer/answer SDP e intercambio de candidatos ICE) y la
//! implementación WebSocket de `VehicleLink`: tras el handshake, el
//! mismo socket transporta los frames JSON del canal de datos
//! (`{type, payload}`), que es la ruta de fallback cuando no hay canal
//! de datos peer dedicado.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::models::ChannelMessage;
use crate::transport::link::{ConnectConfig, LinkSession, VehicleLink};
use crate::utils::errors::CoreError;

/// Mensaje del socket de señalización
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: String, sdp_mline_index: u32 },
    /// El vehículo confirma que el canal de datos está listo
    Ready,
    Bye,
}

/// Construir la URL del socket de señalización: `{base}/car/{vehicleId}`
pub fn signaling_endpoint(base: &str, vehicle_id: &uuid::Uuid) -> String {
    format!("{}/car/{}", base.trim_end_matches('/'), vehicle_id)
}

/// Oferta SDP mínima de solo canal de datos
fn local_offer_sdp(ice_servers: &[String]) -> String {
    // SDP de aplicación sin media; los servidores ICE van como atributos
    // para que el lado del vehículo pueda montar su peer connection.
    let mut sdp = String::from(
        "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=ride-session\r\nt=0 0\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\n",
    );
    for server in ice_servers {
        sdp.push_str(&format!("a=ice-server:{}\r\n", server));
    }
    sdp
}

/// Timeout del handshake de señalización
const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Implementación WebSocket de la estrategia de enlace
pub struct WsVehicleLink;

impl WsVehicleLink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsVehicleLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleLink for WsVehicleLink {
    async fn open(&self, config: &ConnectConfig) -> Result<LinkSession, CoreError> {
        let endpoint = signaling_endpoint(&config.signaling_url, &config.vehicle_id);
        log::info!("📡 Abriendo señalización hacia {}", endpoint);

        let (ws, _) = connect_async(&endpoint)
            .await
            .map_err(|e| CoreError::Signaling(format!("connect to {} failed: {}", endpoint, e)))?;
        let (mut sink, mut stream) = ws.split();

        // Handshake: offer → answer → ready. Los candidatos ICE que
        // lleguen entremedias se registran; su negociación pertenece al
        // peer engine del vehículo.
        let offer = SignalMessage::Offer { sdp: local_offer_sdp(&config.ice_servers) };
        let text = serde_json::to_string(&offer)
            .map_err(|e| CoreError::Signaling(format!("offer encode failed: {}", e)))?;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| CoreError::Signaling(format!("offer send failed: {}", e)))?;

        let handshake = async {
            let mut answered = false;
            while let Some(msg) = stream.next().await {
                let msg =
                    msg.map_err(|e| CoreError::Signaling(format!("signaling read failed: {}", e)))?;
                let Message::Text(text) = msg else { continue };
                let signal: SignalMessage = serde_json::from_str(&text)
                    .map_err(|e| CoreError::Signaling(format!("bad signal message: {}", e)))?;
                match signal {
                    SignalMessage::Answer { .. } => answered = true,
                    SignalMessage::IceCandidate { candidate, .. } => {
                        debug!(candidate = %candidate, "ICE candidate from vehicle");
                    }
                    SignalMessage::Ready if answered => return Ok(()),
                    SignalMessage::Ready => {
                        return Err(CoreError::Signaling("ready before answer".to_string()))
                    }
                    SignalMessage::Bye => {
                        return Err(CoreError::Signaling("vehicle rejected session".to_string()))
                    }
                    SignalMessage::Offer { .. } => {
                        return Err(CoreError::Signaling("unexpected offer from vehicle".to_string()))
                    }
                }
            }
            Err(CoreError::Signaling("signaling socket closed during handshake".to_string()))
        };

        timeout(HANDSHAKE_TIMEOUT, handshake)
            .await
            .map_err(|_| CoreError::Signaling("signaling handshake timed out".to_string()))??;

        log::info!("✅ Canal de datos listo para vehículo {}", config.vehicle_id);

        let (in_tx, in_rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ChannelMessage>();

        // Lector: frames del socket → canal entrante. Al cerrarse el
        // socket se suelta `in_tx` y el transporte observa la pérdida.
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ChannelMessage>(&text) {
                        Ok(frame) => {
                            if in_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping malformed channel frame"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        // Escritor: canal saliente → socket. Termina cuando el transporte
        // suelta el sender en el disconnect.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&frame) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        Ok(LinkSession { incoming: in_rx, outgoing: out_tx })
    }
}
