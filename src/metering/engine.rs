//! Motor de medición del ride
//!
//! Convierte tiempo de conducción en cobros: un tick de 1 segundo, un
//! cobro exactamente en cada frontera de minuto completado, snapshot de
//! saldo siempre autoritativo tras cada cobro, parada forzada cuando el
//! saldo se agota o un cobro falla, y liquidación final con redondeo a
//! minuto empezado. La garantía de facturación es
//! `total cobrado == ceil(segundos / 60) * precio_por_minuto`.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::models::{ceil_minutes, max_ride_seconds, RideSnapshot, RideSummary, StopReason};
use crate::services::BalanceApi;
use crate::utils::errors::CoreError;

/// Evento emitido por el motor de medición
#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    /// Cobro de frontera aplicado para el minuto completado `minute`
    Deducted { minute: u64, amount: i64, new_balance: i64 },
    /// El motor paró el ride por su cuenta (saldo agotado o fallo de cobro)
    ForceStopped { reason: StopReason },
    /// El ride terminó y quedó liquidado
    Stopped { summary: RideSummary },
}

/// Estado del ride en curso
struct RideState {
    vehicle_name: String,
    price_per_minute: i64,
    /// Instante monotónico de arranque; el tiempo transcurrido se
    /// recalcula siempre contra este instante, nunca contando ticks,
    /// para sobrevivir suspensiones de la app sin deriva
    started_at: Instant,
    /// Marca de agua de minutos ya cobrados; solo avanza cuando el
    /// cobro del minuto resolvió, lo que además serializa los cobros
    charged_minutes: u64,
    /// Snapshot de saldo tras el último cobro autoritativo
    balance: i64,
    running: bool,
}

struct Shared<B: BalanceApi> {
    api: Arc<B>,
    state: Mutex<Option<RideState>>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<MeterEvent>>>,
}

impl<B: BalanceApi> Shared<B> {
    fn emit(&self, event: MeterEvent) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Motor de medición y facturación del ride
pub struct MeteringEngine<B: BalanceApi + 'static> {
    shared: Arc<Shared<B>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    min_ride_minutes: i64,
}

impl<B: BalanceApi + 'static> MeteringEngine<B> {
    pub fn new(api: Arc<B>, min_ride_minutes: i64) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                state: Mutex::new(None),
                subscribers: StdMutex::new(Vec::new()),
            }),
            tick_task: Mutex::new(None),
            min_ride_minutes,
        }
    }

    /// Suscribirse a los eventos del motor
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MeterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().expect("subscriber lock poisoned").push(tx);
        rx
    }

    /// Arrancar el ride.
    ///
    /// Exige que el saldo cubra al menos `min_ride_minutes` minutos
    /// antes de permitir el arranque; el mismo gate aplica a la reserva
    /// y al arranque inmediato. Arrancar con un ride ya corriendo es un
    /// no-op que devuelve el snapshot actual.
    pub async fn start(
        &self,
        vehicle_name: &str,
        price_per_minute: i64,
    ) -> Result<RideSnapshot, CoreError> {
        {
            let state = self.shared.state.lock().await;
            if let Some(current) = state.as_ref() {
                if current.running {
                    return Ok(snapshot_of(current));
                }
            }
        }

        if price_per_minute <= 0 {
            return Err(CoreError::Billing(format!(
                "invalid price per minute: {}",
                price_per_minute
            )));
        }

        let balance = self.shared.api.get_balance().await?;
        let required = price_per_minute * self.min_ride_minutes;
        if balance < required {
            return Err(CoreError::InsufficientBalance { required, available: balance });
        }

        let state = RideState {
            vehicle_name: vehicle_name.to_string(),
            price_per_minute,
            started_at: Instant::now(),
            charged_minutes: 0,
            balance,
            running: true,
        };
        let snapshot = snapshot_of(&state);

        *self.shared.state.lock().await = Some(state);

        let shared = self.shared.clone();
        let mut tick_guard = self.tick_task.lock().await;
        if let Some(old) = tick_guard.take() {
            old.abort();
        }
        *tick_guard = Some(tokio::spawn(tick_loop(shared)));

        info!(vehicle = vehicle_name, price_per_minute, balance, "ride started");
        Ok(snapshot)
    }

    /// Parar el ride y liquidarlo.
    ///
    /// Parada manual, por desconexión o por navegación fuera de la
    /// pantalla: todas convergen en la misma liquidación. Devuelve
    /// `RideNotRunning` si no hay ride que parar, de modo que un
    /// teardown doble es un no-op sin llamadas de red duplicadas.
    pub async fn stop(&self, reason: StopReason) -> Result<RideSummary, CoreError> {
        let summary = {
            let mut guard = self.shared.state.lock().await;
            let Some(mut state) = guard.take() else {
                return Err(CoreError::RideNotRunning);
            };
            state.running = false;
            let elapsed = state.started_at.elapsed().as_secs();
            settle(&self.shared, state, elapsed, reason, true).await
        };

        if let Some(task) = self.tick_task.lock().await.take() {
            task.abort();
        }

        self.shared.emit(MeterEvent::Stopped { summary: summary.clone() });
        Ok(summary)
    }

    /// Hay un ride corriendo ahora mismo
    pub async fn is_running(&self) -> bool {
        self.shared.state.lock().await.as_ref().is_some_and(|s| s.running)
    }

    /// Snapshot del ride para la UI, si hay uno
    pub async fn snapshot(&self) -> Option<RideSnapshot> {
        self.shared.state.lock().await.as_ref().map(snapshot_of)
    }
}

fn snapshot_of(state: &RideState) -> RideSnapshot {
    RideSnapshot {
        vehicle_name: state.vehicle_name.clone(),
        price_per_minute: state.price_per_minute,
        elapsed_seconds: state.started_at.elapsed().as_secs(),
        running: state.running,
        balance: state.balance,
        max_ride_seconds: max_ride_seconds(state.balance, state.price_per_minute),
    }
}

/// Loop de tick de 1 segundo del ride
async fn tick_loop<B: BalanceApi + 'static>(shared: Arc<Shared<B>>) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // el primer tick de `interval` resuelve inmediatamente
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut guard = shared.state.lock().await;

        // transcurrido estrictamente desde el instante monotónico de
        // arranque: un tick lento o una suspensión no pierden fronteras
        let completed = match guard.as_ref() {
            Some(s) if s.running => s.started_at.elapsed().as_secs() / 60,
            _ => return,
        };

        // un cobro por frontera, en orden, cada uno esperado antes del
        // siguiente; la marca de agua hace el disparo único por minuto
        loop {
            let (charged, price, name) = match guard.as_ref() {
                Some(s) => (s.charged_minutes, s.price_per_minute, s.vehicle_name.clone()),
                None => return,
            };
            if charged >= completed {
                break;
            }

            let minute = charged + 1;
            match shared.api.deduct_for_ride(price, &name, 60).await {
                Ok(o) if o.success => {
                    if let Some(s) = guard.as_mut() {
                        s.charged_minutes = minute;
                        s.balance = o.new_balance;
                    }
                    shared.emit(MeterEvent::Deducted {
                        minute,
                        amount: price,
                        new_balance: o.new_balance,
                    });

                    if o.new_balance <= 0 {
                        // saldo agotado: parar antes de que empiece a
                        // acumular el siguiente minuto
                        force_stop(&shared, &mut guard, minute * 60).await;
                        return;
                    }
                }
                Ok(o) => {
                    warn!(
                        minute,
                        error = o.error.as_deref().unwrap_or("insufficient funds"),
                        "boundary deduction refused"
                    );
                    force_stop(&shared, &mut guard, charged * 60).await;
                    return;
                }
                Err(e) => {
                    warn!(minute, error = %e, "boundary deduction failed");
                    force_stop(&shared, &mut guard, charged * 60).await;
                    return;
                }
            }
        }
    }
}

/// Parada forzada desde el loop de tick, con el lock de estado tomado.
///
/// `elapsed` queda congelado en el instante de la decisión para que no
/// se observe acumulación posterior; un cobro que acaba de fallar no se
/// reintenta en la liquidación.
async fn force_stop<B: BalanceApi + 'static>(
    shared: &Arc<Shared<B>>,
    guard: &mut MutexGuard<'_, Option<RideState>>,
    elapsed: u64,
) {
    let Some(mut state) = guard.take() else { return };
    state.running = false;

    let reason = StopReason::BalanceExhausted;
    shared.emit(MeterEvent::ForceStopped { reason });

    let summary = settle(shared, state, elapsed, reason, false).await;
    shared.emit(MeterEvent::Stopped { summary });
}

/// Liquidación final: cobra el minuto parcial pendiente, si lo hay.
///
/// `attempt_final_charge` es falso en la parada forzada: un cobro que
/// falló nunca se reintenta, y tras agotar el saldo no queda nada que
/// cobrar.
async fn settle<B: BalanceApi + 'static>(
    shared: &Arc<Shared<B>>,
    state: RideState,
    elapsed: u64,
    reason: StopReason,
    attempt_final_charge: bool,
) -> RideSummary {
    let minutes_billed = ceil_minutes(elapsed);
    let pending_minutes = minutes_billed.saturating_sub(state.charged_minutes);
    let mut final_balance = state.balance;

    if pending_minutes > 0 && attempt_final_charge {
        let amount = pending_minutes as i64 * state.price_per_minute;
        let partial_seconds = elapsed - state.charged_minutes * 60;
        match shared
            .api
            .deduct_for_ride(amount, &state.vehicle_name, partial_seconds)
            .await
        {
            Ok(o) if o.success => final_balance = o.new_balance,
            Ok(o) => {
                warn!(
                    error = o.error.as_deref().unwrap_or("refused"),
                    "settlement deduction refused"
                );
                final_balance = o.new_balance;
            }
            Err(e) => warn!(error = %e, "settlement deduction failed"),
        }
    }

    let summary = RideSummary {
        vehicle_name: state.vehicle_name,
        elapsed_seconds: elapsed,
        minutes_billed,
        total_cost: minutes_billed as i64 * state.price_per_minute,
        final_balance,
        reason,
    };
    info!(
        elapsed_seconds = summary.elapsed_seconds,
        minutes_billed = summary.minutes_billed,
        total_cost = summary.total_cost,
        reason = ?summary.reason,
        "ride settled"
    );
    summary
}
