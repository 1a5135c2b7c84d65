//! Gestor de reservas
//!
//! Coordina el claim exclusivo y acotado en el tiempo sobre una unidad:
//! creación, cancelación, consumo y la vigilancia de expiración del
//! lado cliente. La vigilancia con resolución de 1 segundo es una
//! garantía de vivacidad frente a la latencia del servidor, no un
//! sustituto del enforcement autoritativo.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Reservation, ReservationStatus, StatusHint, UnitStatus};
use crate::services::ReservationApi;
use crate::utils::errors::CoreError;

/// Evento emitido por el gestor de reservas
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationEvent {
    /// La vigilancia local detectó `now >= expires_at` en una reserva
    /// todavía marcada activa
    Expired(Reservation),
}

struct Shared {
    active: RwLock<Option<Reservation>>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<ReservationEvent>>>,
    /// Pista optimista del estado de la unidad tras una mutación local,
    /// pendiente de reconciliar con la siguiente lectura autoritativa
    unit_hint: StdMutex<Option<(Uuid, StatusHint)>>,
}

impl Shared {
    fn emit(&self, event: ReservationEvent) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Gestor de reservas del usuario
pub struct ReservationManager<R: ReservationApi + 'static> {
    api: Arc<R>,
    shared: Arc<Shared>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    watch_interval: Duration,
}

impl<R: ReservationApi + 'static> ReservationManager<R> {
    pub fn new(api: Arc<R>) -> Self {
        Self {
            api,
            shared: Arc::new(Shared {
                active: RwLock::new(None),
                subscribers: StdMutex::new(Vec::new()),
                unit_hint: StdMutex::new(None),
            }),
            watch_task: Mutex::new(None),
            watch_interval: Duration::from_secs(1),
        }
    }

    /// Ajustar el periodo de la vigilancia de expiración (pruebas)
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Suscribirse a los eventos del gestor
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ReservationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().expect("subscriber lock poisoned").push(tx);
        rx
    }

    /// Crear una reserva para el vehículo indicado.
    ///
    /// Chequeo optimista local de "una reserva activa como máximo";
    /// el servidor lo vuelve a imponer autoritativamente.
    pub async fn create_reservation(&self, vehicle_id: Uuid) -> Result<Reservation, CoreError> {
        if self.get_active_reservation().await.is_some() {
            return Err(CoreError::ReservationAlreadyActive);
        }

        let reservation = self.api.create(vehicle_id).await?;
        info!(
            reservation_id = %reservation.id,
            expires_at = %reservation.expires_at,
            "reservation created"
        );

        *self.shared.active.write().await = Some(reservation.clone());
        self.start_watch().await;
        Ok(reservation)
    }

    /// Cancelar la reserva activa; libera la unidad de inmediato
    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> Result<(), CoreError> {
        let current = self.get_active_reservation().await;
        match current {
            Some(r) if r.id == reservation_id => {}
            _ => return Err(CoreError::ReservationNotActive(reservation_id.to_string())),
        }

        self.api.cancel(reservation_id).await?;

        let cleared = self.shared.active.write().await.take();
        self.stop_watch().await;

        // Pista optimista: asumimos la unidad libre ya, pendiente de
        // reconciliar contra la siguiente lectura del servidor
        if let Some(unit_id) = cleared.and_then(|r| r.unit_id) {
            *self.shared.unit_hint.lock().expect("hint lock poisoned") =
                Some((unit_id, StatusHint::Hint(UnitStatus::Available)));
        }

        info!(reservation_id = %reservation_id, "reservation canceled");
        Ok(())
    }

    /// Consumir la reserva para arrancar un ride.
    ///
    /// Única transición sancionada de "tengo una reserva" a "ride
    /// activo". Revalida frescura antes de llamar al servidor: una
    /// reserva que expiró mientras el usuario navegaba a la pantalla de
    /// control nunca debe arrancar un vehículo.
    pub async fn use_reservation(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        let now = Utc::now();
        {
            let active = self.shared.active.read().await;
            match active.as_ref() {
                Some(r) if r.id == reservation_id => {
                    if !r.is_active_at(now) {
                        drop(active);
                        self.expire_locally().await;
                        return Err(CoreError::ReservationExpired(reservation_id.to_string()));
                    }
                }
                _ => return Err(CoreError::ReservationNotActive(reservation_id.to_string())),
            }
        }

        let used = self.api.use_reservation(reservation_id).await?;

        *self.shared.active.write().await = None;
        self.stop_watch().await;

        info!(reservation_id = %reservation_id, "reservation consumed");
        Ok(used)
    }

    /// Reserva activa actual, con el chequeo de expiración aplicado
    /// aunque el servidor todavía no haya volcado el estado
    pub async fn get_active_reservation(&self) -> Option<Reservation> {
        let now = Utc::now();
        let snapshot = self.shared.active.read().await.clone();
        match snapshot {
            Some(r) if r.is_active_at(now) => Some(r),
            Some(_) => {
                self.expire_locally().await;
                None
            }
            None => None,
        }
    }

    /// Sincronizar con el servidor la reserva activa del usuario
    pub async fn refresh_from_server(&self) -> Result<Option<Reservation>, CoreError> {
        let server_side = self.api.get_active().await?;
        {
            let mut active = self.shared.active.write().await;
            *active = server_side.clone();
        }
        match &server_side {
            Some(_) => self.start_watch().await,
            None => self.stop_watch().await,
        }
        Ok(self.get_active_reservation().await)
    }

    /// Pista optimista pendiente del estado de una unidad
    pub fn unit_status_hint(&self) -> Option<(Uuid, StatusHint)> {
        *self.shared.unit_hint.lock().expect("hint lock poisoned")
    }

    /// Reconciliar la pista con una lectura autoritativa
    pub fn reconcile_unit_status(&self, unit_id: Uuid, authoritative: UnitStatus) {
        let mut hint = self.shared.unit_hint.lock().expect("hint lock poisoned");
        if let Some((pending, status)) = hint.as_mut() {
            if *pending == unit_id {
                status.reconcile(authoritative);
            }
        }
    }

    /// Parar la vigilancia y limpiar estado local. Idempotente.
    pub async fn teardown(&self) {
        self.stop_watch().await;
        *self.shared.active.write().await = None;
    }

    /// Expirar localmente la reserva actual y notificar a la UI
    async fn expire_locally(&self) {
        let expired = {
            let mut active = self.shared.active.write().await;
            match active.take() {
                Some(mut r) => {
                    r.status = ReservationStatus::Expired;
                    Some(r)
                }
                None => None,
            }
        };
        if let Some(r) = expired {
            warn!(reservation_id = %r.id, "reservation expired locally");
            self.stop_watch().await;
            self.shared.emit(ReservationEvent::Expired(r));
        }
    }

    /// Arrancar la vigilancia de expiración si no está ya corriendo
    async fn start_watch(&self) {
        let mut guard = self.watch_task.lock().await;
        if guard.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let shared = self.shared.clone();
        let period = self.watch_interval;
        *guard = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // el tiempo restante sale siempre de expires_at contra
                // el reloj actual, nunca de contar ticks
                let now = Utc::now();
                let expired = {
                    let mut active = shared.active.write().await;
                    match active.as_ref() {
                        Some(r) if !r.is_active_at(now) => {
                            let mut r = active.take().expect("checked above");
                            r.status = ReservationStatus::Expired;
                            Some(r)
                        }
                        Some(_) => None,
                        None => return,
                    }
                };
                if let Some(r) = expired {
                    warn!(reservation_id = %r.id, "reservation expired locally");
                    shared.emit(ReservationEvent::Expired(r));
                    return;
                }
            }
        }));
    }

    async fn stop_watch(&self) {
        if let Some(task) = self.watch_task.lock().await.take() {
            task.abort();
        }
    }
}
