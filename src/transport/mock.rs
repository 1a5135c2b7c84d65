//! Enlace simulado con el vehículo
//!
//! Implementación en memoria de `VehicleLink` para pruebas y para el
//! modo demo sin hardware: el "vehículo" es un par de canales que la
//! prueba maneja a través de `MockPeer` (inyectar telemetría, leer
//! comandos, cortar el enlace).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::ChannelMessage;
use crate::transport::link::{ConnectConfig, LinkSession, VehicleLink};
use crate::utils::errors::CoreError;

/// Lado "vehículo" de una sesión simulada
pub struct MockPeer {
    /// Inyectar frames hacia el cliente
    pub to_client: mpsc::UnboundedSender<ChannelMessage>,
    /// Leer frames enviados por el cliente
    pub from_client: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl MockPeer {
    /// Cortar el enlace desde el lado del vehículo
    pub fn drop_link(self) {}
}

/// Enlace simulado; cada `open` entrega una sesión nueva en memoria
pub struct MockVehicleLink {
    /// Número de aperturas que deben fallar antes de la primera exitosa
    fail_next_opens: AtomicUsize,
    opens: AtomicUsize,
    peers: Mutex<VecDeque<MockPeer>>,
}

impl MockVehicleLink {
    pub fn new() -> Self {
        Self {
            fail_next_opens: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            peers: Mutex::new(VecDeque::new()),
        }
    }

    /// Programar `n` aperturas fallidas consecutivas
    pub fn fail_next_opens(&self, n: usize) {
        self.fail_next_opens.store(n, Ordering::SeqCst);
    }

    /// Total de intentos de apertura observados
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Tomar el lado vehículo de la sesión abierta más antigua pendiente
    pub fn take_peer(&self) -> Option<MockPeer> {
        self.peers.lock().expect("peer lock poisoned").pop_front()
    }
}

impl Default for MockVehicleLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleLink for MockVehicleLink {
    async fn open(&self, config: &ConnectConfig) -> Result<LinkSession, CoreError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::Signaling(format!(
                "simulated signaling failure for vehicle {}",
                config.vehicle_id
            )));
        }

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        self.peers
            .lock()
            .expect("peer lock poisoned")
            .push_back(MockPeer { to_client: in_tx, from_client: out_rx });

        Ok(LinkSession { incoming: in_rx, outgoing: out_tx })
    }
}
