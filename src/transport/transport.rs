//! Transporte en tiempo real hacia el vehículo
//!
//! Mantiene una sesión bidireccional con un único vehículo sobre la
//! estrategia de enlace inyectada, multiplexando telemetría entrante y
//! comandos de control salientes, con heartbeat periódico y
//! recuperación automática por backoff exponencial. Es un objeto por
//! pantalla de control, construido y destruido con ella; nunca un
//! singleton compartido.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EnvironmentConfig;
use crate::models::{ChannelMessage, ControlCommand, MediaStreamInfo};
use crate::transport::events::TransportEvent;
use crate::transport::link::{ConnectConfig, VehicleLink};
use crate::transport::state::ConnectionState;
use crate::utils::errors::CoreError;

/// Backoff inicial de reconexión
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Tope del backoff de reconexión
const MAX_BACKOFF: Duration = Duration::from_secs(30);

struct Inner {
    state: ConnectionState,
    config: Option<ConnectConfig>,
    /// Generación de sesión: se incrementa en cada connect/disconnect
    /// para que una reconexión obsoleta no resucite una sesión ya
    /// abandonada por el usuario.
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<ChannelMessage>>,
    run_task: Option<JoinHandle<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
    last_telemetry_at: Option<DateTime<Utc>>,
}

struct Shared {
    inner: RwLock<Inner>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    link: Arc<dyn VehicleLink>,
    heartbeat_interval: Duration,
    max_reconnect_attempts: u32,
}

impl Shared {
    /// Emitir un evento a todos los suscriptores vivos
    fn emit(&self, event: TransportEvent) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Transición de estado con el lock de escritura ya tomado
    fn set_state_locked(&self, inner: &mut Inner, next: ConnectionState) {
        if inner.state == next {
            return;
        }
        if !inner.state.can_transition_to(next) {
            warn!(from = ?inner.state, to = ?next, "invalid connection state transition");
            return;
        }
        debug!(from = ?inner.state, to = ?next, "connection state changed");
        inner.state = next;
        self.emit(TransportEvent::StateChanged(next));
    }
}

/// Transporte en tiempo real con un vehículo
pub struct RealtimeTransport {
    shared: Arc<Shared>,
}

impl RealtimeTransport {
    pub fn new(link: Arc<dyn VehicleLink>, config: &EnvironmentConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: RwLock::new(Inner {
                    state: ConnectionState::Disconnected,
                    config: None,
                    generation: 0,
                    outgoing: None,
                    run_task: None,
                    heartbeat_task: None,
                    last_telemetry_at: None,
                }),
                subscribers: StdMutex::new(Vec::new()),
                link,
                heartbeat_interval: config.heartbeat_interval(),
                max_reconnect_attempts: config.reconnect_max_attempts,
            }),
        }
    }

    /// Suscribirse al stream de eventos del transporte
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().expect("subscriber lock poisoned").push(tx);
        rx
    }

    /// Estado actual de la conexión
    pub async fn state(&self) -> ConnectionState {
        self.shared.inner.read().await.state
    }

    /// Vehículo de la sesión en curso, si hay una
    pub async fn vehicle_id(&self) -> Option<Uuid> {
        self.shared.inner.read().await.config.as_ref().map(|c| c.vehicle_id)
    }

    /// Timestamp del último frame de telemetría recibido, para que la
    /// UI pueda marcar datos rancios
    pub async fn last_telemetry_at(&self) -> Option<DateTime<Utc>> {
        self.shared.inner.read().await.last_telemetry_at
    }

    /// Conectar con el vehículo indicado.
    ///
    /// Idempotente por instancia: reconectar al mismo vehículo con una
    /// sesión viva es un no-op; pedir otro vehículo con una sesión viva
    /// falla rápido. Los errores de señalización previos a la conexión
    /// rechazan esta llamada; los posteriores viajan por eventos.
    pub async fn connect(&self, config: ConnectConfig) -> Result<(), CoreError> {
        let generation = {
            let mut inner = self.shared.inner.write().await;

            if inner.state.is_session_live() {
                return match &inner.config {
                    Some(current) if current.vehicle_id == config.vehicle_id => Ok(()),
                    _ => Err(CoreError::TransportBusy(
                        inner
                            .config
                            .as_ref()
                            .map(|c| c.vehicle_id.to_string())
                            .unwrap_or_default(),
                    )),
                };
            }
            if inner.state.is_terminal() {
                return Err(CoreError::Transport(
                    "session failed permanently; disconnect before reconnecting".to_string(),
                ));
            }

            inner.generation += 1;
            inner.config = Some(config.clone());
            self.shared.set_state_locked(&mut inner, ConnectionState::Connecting);
            inner.generation
        };

        info!(vehicle_id = %config.vehicle_id, "connecting realtime transport");

        match self.shared.link.open(&config).await {
            Ok(session) => {
                let mut inner = self.shared.inner.write().await;
                if inner.generation != generation {
                    // un disconnect ganó la carrera mientras abríamos
                    return Err(CoreError::Transport("disconnected during connect".to_string()));
                }
                inner.outgoing = Some(session.outgoing);
                self.shared.set_state_locked(&mut inner, ConnectionState::Connected);
                inner.run_task = Some(tokio::spawn(run_loop(
                    self.shared.clone(),
                    session.incoming,
                    generation,
                )));
                inner.heartbeat_task =
                    Some(tokio::spawn(heartbeat_loop(self.shared.clone(), generation)));
                Ok(())
            }
            Err(e) => {
                let mut inner = self.shared.inner.write().await;
                if inner.generation == generation {
                    self.shared.set_state_locked(&mut inner, ConnectionState::Failed);
                }
                Err(e)
            }
        }
    }

    /// Derribar la sesión incondicionalmente.
    ///
    /// Seguro de llamar varias veces; cancela el loop de recepción, el
    /// heartbeat y cualquier backoff de reconexión pendiente.
    pub async fn disconnect(&self) {
        let (run, hb) = {
            let mut inner = self.shared.inner.write().await;
            inner.generation += 1;
            inner.outgoing = None;
            inner.config = None;
            let run = inner.run_task.take();
            let hb = inner.heartbeat_task.take();
            self.shared.set_state_locked(&mut inner, ConnectionState::Disconnected);
            (run, hb)
        };
        if let Some(t) = run {
            t.abort();
        }
        if let Some(t) = hb {
            t.abort();
        }
    }

    /// Enviar un comando de control.
    ///
    /// Si el canal no está abierto el comando se descarta con un warning:
    /// un comando de dirección rancio es peor que uno perdido, así que
    /// nunca se encola para más tarde.
    pub async fn send_control_command(&self, command: ControlCommand) {
        let inner = self.shared.inner.read().await;
        if inner.state == ConnectionState::Connected {
            if let Some(tx) = &inner.outgoing {
                if tx.send(ChannelMessage::Control(command)).is_ok() {
                    return;
                }
            }
        }
        warn!(state = ?inner.state, "control command dropped: channel not open");
    }
}

/// Loop de recepción: bombea frames entrantes y conduce la reconexión
async fn run_loop(
    shared: Arc<Shared>,
    mut incoming: mpsc::UnboundedReceiver<ChannelMessage>,
    generation: u64,
) {
    loop {
        while let Some(frame) = incoming.recv().await {
            match frame {
                ChannelMessage::Telemetry(f) => {
                    shared.inner.write().await.last_telemetry_at = Some(Utc::now());
                    shared.emit(TransportEvent::Telemetry(f));
                }
                ChannelMessage::Status(status) => {
                    if let Some(stream_id) = status.stream_id {
                        let vehicle_id = shared
                            .inner
                            .read()
                            .await
                            .config
                            .as_ref()
                            .map(|c| c.vehicle_id.to_string())
                            .unwrap_or_default();
                        shared.emit(TransportEvent::RemoteStream(MediaStreamInfo {
                            stream_id,
                            vehicle_id,
                        }));
                    }
                }
                ChannelMessage::Heartbeat => debug!("heartbeat from vehicle"),
                ChannelMessage::Control(_) => warn!("unexpected inbound control frame"),
            }
        }

        // Enlace perdido: reconectar solo si seguimos siendo la sesión activa
        {
            let mut inner = shared.inner.write().await;
            if inner.generation != generation || inner.state != ConnectionState::Connected {
                return;
            }
            inner.outgoing = None;
            shared.set_state_locked(&mut inner, ConnectionState::Reconnecting);
        }
        shared.emit(TransportEvent::Error("realtime link lost".to_string()));

        let mut delay = INITIAL_BACKOFF;
        let mut reconnected = false;
        for attempt in 1..=shared.max_reconnect_attempts {
            sleep(delay).await;
            delay = (delay * 2).min(MAX_BACKOFF);

            let config = {
                let inner = shared.inner.read().await;
                if inner.generation != generation {
                    return;
                }
                match inner.config.clone() {
                    Some(c) => c,
                    None => return,
                }
            };

            info!(attempt, vehicle_id = %config.vehicle_id, "reconnect attempt");
            match shared.link.open(&config).await {
                Ok(session) => {
                    let mut inner = shared.inner.write().await;
                    if inner.generation != generation {
                        // reconexión obsoleta: el usuario ya se fue
                        return;
                    }
                    inner.outgoing = Some(session.outgoing);
                    shared.set_state_locked(&mut inner, ConnectionState::Connected);
                    incoming = session.incoming;
                    reconnected = true;
                    break;
                }
                Err(e) => {
                    shared.emit(TransportEvent::Error(format!(
                        "reconnect attempt {} failed: {}",
                        attempt, e
                    )));
                }
            }
        }

        if !reconnected {
            let mut inner = shared.inner.write().await;
            if inner.generation == generation {
                shared.set_state_locked(&mut inner, ConnectionState::Failed);
            }
            drop(inner);
            shared.emit(TransportEvent::ReconnectFailed);
            return;
        }
    }
}

/// Heartbeat periódico por el canal de control mientras estamos conectados
async fn heartbeat_loop(shared: Arc<Shared>, generation: u64) {
    let mut ticker = interval(shared.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // el primer tick de `interval` es inmediato
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let inner = shared.inner.read().await;
        if inner.generation != generation || inner.state.is_terminal() {
            return;
        }
        if inner.state == ConnectionState::Connected {
            if let Some(tx) = &inner.outgoing {
                let _ = tx.send(ChannelMessage::Heartbeat);
            }
        }
    }
}
