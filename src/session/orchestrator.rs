//! Orquestador de la sesión de control
//!
//! Compone transporte, reservas y medición para la pantalla de control:
//! inicializa las tres patas de forma independiente, convierte la
//! reserva en ride exactamente una vez, bombea la telemetría al estado
//! de UI y garantiza un teardown único sea cual sea la ruta de salida
//! (parada manual, forzada, abandono o desmontaje).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EnvironmentConfig;
use crate::metering::{MeterEvent, MeteringEngine};
use crate::models::{
    ControlCommand, Reservation, RideSummary, StopReason, TelemetryFrame, VehicleDetail,
};
use crate::reservation::ReservationManager;
use crate::services::{BalanceApi, ReservationApi, UserLevelApi, VehicleApi};
use crate::transport::{ConnectConfig, RealtimeTransport, TransportEvent, VehicleLink};
use crate::utils::errors::CoreError;

/// Reintentos de liberación de unidad tras un fallo
const RELEASE_RETRY_ATTEMPTS: u32 = 3;
/// Espera entre reintentos de liberación
const RELEASE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Resultado de la secuencia de entrada a la pantalla de control.
///
/// Las tres patas se intentan de forma independiente: un fallo del
/// transporte no impide ver la ficha del vehículo, pero deshabilita los
/// controles de arranque.
#[derive(Debug, Clone)]
pub struct EntryReport {
    pub vehicle: Option<VehicleDetail>,
    pub balance: Option<i64>,
    pub transport_connected: bool,
    pub controls_ready: bool,
    pub warnings: Vec<String>,
}

/// Orquestador de la sesión de control de un vehículo
pub struct SessionOrchestrator<V, B, R, L>
where
    V: VehicleApi + 'static,
    B: BalanceApi + 'static,
    R: ReservationApi + 'static,
    L: UserLevelApi + 'static,
{
    config: EnvironmentConfig,
    vehicle_id: Uuid,
    vehicles: Arc<V>,
    balance: Arc<B>,
    levels: Arc<L>,
    pub transport: Arc<RealtimeTransport>,
    pub reservations: Arc<ReservationManager<R>>,
    pub engine: Arc<MeteringEngine<B>>,
    vehicle: RwLock<Option<VehicleDetail>>,
    last_telemetry: RwLock<Option<TelemetryFrame>>,
    /// Tareas de bombeo de eventos; se abortan en el teardown para que
    /// el orquestador no quede retenido por sus propios suscriptores
    pumps: StdMutex<Vec<JoinHandle<()>>>,
    controls_ready: AtomicBool,
    torn_down: AtomicBool,
    unit_released: AtomicBool,
}

impl<V, B, R, L> SessionOrchestrator<V, B, R, L>
where
    V: VehicleApi + 'static,
    B: BalanceApi + 'static,
    R: ReservationApi + 'static,
    L: UserLevelApi + 'static,
{
    /// Construir el orquestador para una activación de la pantalla de
    /// control. Un objeto por pantalla: se construye al entrar y se
    /// destruye al salir, nunca se comparte entre sesiones.
    pub fn new(
        config: EnvironmentConfig,
        vehicle_id: Uuid,
        vehicles: Arc<V>,
        balance: Arc<B>,
        reservations: Arc<R>,
        levels: Arc<L>,
        link: Arc<dyn VehicleLink>,
    ) -> Arc<Self> {
        let transport = Arc::new(RealtimeTransport::new(link, &config));
        let manager = Arc::new(ReservationManager::new(reservations));
        let engine = Arc::new(MeteringEngine::new(balance.clone(), config.min_ride_minutes));

        Arc::new(Self {
            config,
            vehicle_id,
            vehicles,
            balance,
            levels,
            transport,
            reservations: manager,
            engine,
            vehicle: RwLock::new(None),
            last_telemetry: RwLock::new(None),
            pumps: StdMutex::new(Vec::new()),
            controls_ready: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            unit_released: AtomicBool::new(false),
        })
    }

    /// Secuencia de entrada: ficha del vehículo, saldo y transporte,
    /// intentados de forma independiente; cada fallo se reporta sin
    /// bloquear a los demás.
    pub async fn enter(self: &Arc<Self>) -> EntryReport {
        let connect_config = ConnectConfig {
            vehicle_id: self.vehicle_id,
            signaling_url: self.config.signaling_url.clone(),
            ice_servers: self.config.ice_servers.clone(),
        };

        let (vehicle_res, balance_res, transport_res) = tokio::join!(
            self.vehicles.get_vehicle(self.vehicle_id),
            self.balance.get_balance(),
            self.transport.connect(connect_config),
        );

        let mut warnings = Vec::new();

        let vehicle = match vehicle_res {
            Ok(v) => {
                *self.vehicle.write().await = Some(v.clone());
                Some(v)
            }
            Err(e) => {
                warn!(error = %e, "vehicle detail fetch failed");
                warnings.push(e.user_message());
                None
            }
        };

        let balance = match balance_res {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(error = %e, "balance fetch failed");
                warnings.push(e.user_message());
                None
            }
        };

        let transport_connected = match transport_res {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "transport connect failed");
                warnings.push(e.user_message());
                false
            }
        };

        let controls_ready = transport_connected && vehicle.is_some() && balance.is_some();
        self.controls_ready.store(controls_ready, Ordering::SeqCst);

        self.spawn_transport_pump();
        self.spawn_meter_pump();

        info!(
            vehicle_id = %self.vehicle_id,
            controls_ready,
            "control session entered"
        );

        EntryReport { vehicle, balance, transport_connected, controls_ready, warnings }
    }

    /// Reservar el vehículo de esta sesión.
    ///
    /// Aplica los mismos gates que el arranque inmediato: nivel mínimo
    /// del vehículo y saldo para al menos `min_ride_minutes` minutos.
    pub async fn reserve(self: &Arc<Self>) -> Result<Reservation, CoreError> {
        let vehicle = self.require_vehicle().await?;
        self.check_level_gate(&vehicle).await?;
        self.check_balance_gate(&vehicle).await?;
        self.reservations.create_reservation(self.vehicle_id).await
    }

    /// Arrancar el ride.
    ///
    /// Con reserva: revalidar frescura → consumirla exactamente una vez
    /// → poner el reloj a cero → arrancar la medición. Sin reserva
    /// (arranque inmediato): mismos gates, sin paso de consumo.
    pub async fn start_ride(self: &Arc<Self>) -> Result<(), CoreError> {
        if !self.controls_ready.load(Ordering::SeqCst) {
            return Err(CoreError::Transport("controls are not ready".to_string()));
        }

        let vehicle = self.require_vehicle().await?;
        self.check_level_gate(&vehicle).await?;

        // la revalidación de frescura y el consumo único viven en el
        // gestor; una reserva muerta jamás arranca un vehículo
        if let Some(reservation) = self.reservations.get_active_reservation().await {
            if reservation.vehicle_id != self.vehicle_id {
                return Err(CoreError::ReservationNotActive(reservation.id.to_string()));
            }
            self.reservations.use_reservation(reservation.id).await?;
        }

        self.unit_released.store(false, Ordering::SeqCst);
        self.engine.start(&vehicle.name, vehicle.price_per_minute).await?;

        // confirmación háptica delegada a la capa de UI
        info!(vehicle = %vehicle.name, "📳 ride started");
        Ok(())
    }

    /// Parada manual confirmada por el usuario
    pub async fn stop_ride(self: &Arc<Self>) -> Result<RideSummary, CoreError> {
        let summary = self.engine.stop(StopReason::UserConfirmed).await?;
        self.release_unit().await;
        Ok(summary)
    }

    /// Enviar un comando de control al vehículo
    pub async fn send_control(&self, command: ControlCommand) {
        self.transport.send_control_command(command).await;
    }

    /// Último frame de telemetría bombeado al estado de UI
    pub async fn telemetry(&self) -> Option<TelemetryFrame> {
        self.last_telemetry.read().await.clone()
    }

    /// Los controles de conducción están habilitados
    pub fn controls_ready(&self) -> bool {
        self.controls_ready.load(Ordering::SeqCst)
    }

    /// Teardown de salida, válido para cualquier ruta: parada manual ya
    /// liquidada, parada forzada, abandono antes de arrancar o
    /// desmontaje. Re-entrante: la segunda invocación es un no-op sin
    /// llamadas de red duplicadas.
    pub async fn teardown(self: &Arc<Self>) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(vehicle_id = %self.vehicle_id, "tearing down control session");

        // parar la medición exactamente una vez; solo liquida y libera
        // si había un ride realmente activo
        match self.engine.stop(StopReason::Disconnected).await {
            Ok(_) => self.release_unit().await,
            Err(CoreError::RideNotRunning) => {}
            Err(e) => warn!(error = %e, "metering stop failed during teardown"),
        }

        self.reservations.teardown().await;
        self.transport.disconnect().await;
        self.controls_ready.store(false, Ordering::SeqCst);

        // los bombeos retienen un Arc<Self>; sin esto la sesión nunca
        // se liberaría tras salir de la pantalla
        for task in self.pumps.lock().expect("pump lock poisoned").drain(..) {
            task.abort();
        }
    }

    async fn require_vehicle(&self) -> Result<VehicleDetail, CoreError> {
        self.vehicle
            .read()
            .await
            .clone()
            .ok_or_else(|| CoreError::Internal("vehicle detail not loaded".to_string()))
    }

    async fn check_level_gate(&self, vehicle: &VehicleDetail) -> Result<(), CoreError> {
        let level = self.levels.get_user_level().await?;
        if level < vehicle.min_level_required {
            return Err(CoreError::InsufficientLevel {
                required: vehicle.min_level_required,
                actual: level,
            });
        }
        Ok(())
    }

    async fn check_balance_gate(&self, vehicle: &VehicleDetail) -> Result<(), CoreError> {
        let balance = self.balance.get_balance().await?;
        let required = vehicle.price_per_minute * self.config.min_ride_minutes;
        if balance < required {
            return Err(CoreError::InsufficientBalance { required, available: balance });
        }
        Ok(())
    }

    /// Liberar la unidad exactamente una vez por ride.
    ///
    /// El fallo de liberación no bloquea la confirmación al usuario: su
    /// obligación (el pago) ya quedó liquidada. Se reintenta en segundo
    /// plano un número acotado de veces y después queda en manos de la
    /// reconciliación del servidor.
    async fn release_unit(self: &Arc<Self>) {
        if self.unit_released.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.vehicles.release_after_ride(self.vehicle_id).await {
            Ok(_) => info!(vehicle_id = %self.vehicle_id, "unit released"),
            Err(e) => {
                warn!(error = %e, "unit release failed, scheduling retries");
                let this = self.clone();
                tokio::spawn(async move {
                    for attempt in 1..=RELEASE_RETRY_ATTEMPTS {
                        tokio::time::sleep(RELEASE_RETRY_DELAY).await;
                        match this.vehicles.release_after_ride(this.vehicle_id).await {
                            Ok(_) => {
                                info!(attempt, "unit released on retry");
                                return;
                            }
                            Err(e) => warn!(attempt, error = %e, "unit release retry failed"),
                        }
                    }
                    warn!(
                        vehicle_id = %this.vehicle_id,
                        "unit release abandoned after retries; server-side reconciliation owns it"
                    );
                });
            }
        }
    }

    /// Bombear eventos del transporte al estado de UI
    fn spawn_transport_pump(self: &Arc<Self>) {
        let mut events = self.transport.subscribe();
        let this = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Telemetry(frame) => {
                        // cada frame reemplaza por completo al anterior
                        *this.last_telemetry.write().await = Some(frame);
                    }
                    TransportEvent::ReconnectFailed => {
                        warn!("transport permanently failed; disabling ride controls");
                        this.controls_ready.store(false, Ordering::SeqCst);
                    }
                    _ => {}
                }
            }
        });
        self.pumps.lock().expect("pump lock poisoned").push(task);
    }

    /// Reaccionar a la parada forzada del motor: liberar la unidad.
    /// La liquidación ya la hizo el propio motor.
    fn spawn_meter_pump(self: &Arc<Self>) {
        let mut events = self.engine.subscribe();
        let this = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let MeterEvent::ForceStopped { reason } = event {
                    info!(reason = ?reason, "{}", reason.user_message());
                    this.release_unit().await;
                }
            }
        });
        self.pumps.lock().expect("pump lock poisoned").push(task);
    }

    /// Canal de eventos del transporte para la capa de UI
    pub fn subscribe_transport(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.transport.subscribe()
    }
}
