//! Colaboradores simulados compartidos por las pruebas de integración.
//!
//! Cada mock cuenta sus llamadas para poder afirmar "exactamente una
//! liquidación, exactamente una liberación" en las pruebas de
//! idempotencia del teardown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ride_session::services::{
    BalanceApi, DeductOutcome, ReservationApi, UserLevelApi, VehicleApi,
};
use ride_session::{
    CoreError, ReleaseOutcome, Reservation, ReservationStatus, UnitStatus, VehicleDetail,
};
use uuid::Uuid;

/// Monedero simulado con guion de fallos
pub struct MockBalanceApi {
    balance: Mutex<i64>,
    /// Registro de cobros: (importe, segundos)
    pub deducts: Mutex<Vec<(i64, u64)>>,
    get_calls: AtomicUsize,
    /// Rechazar todos los cobros con success=false
    refuse_deducts: AtomicBool,
    /// Devolver error de red en todos los cobros
    fail_deducts: AtomicBool,
}

impl MockBalanceApi {
    pub fn new(balance: i64) -> Self {
        Self {
            balance: Mutex::new(balance),
            deducts: Mutex::new(Vec::new()),
            get_calls: AtomicUsize::new(0),
            refuse_deducts: AtomicBool::new(false),
            fail_deducts: AtomicBool::new(false),
        }
    }

    pub fn refuse_all_deducts(&self) {
        self.refuse_deducts.store(true, Ordering::SeqCst);
    }

    pub fn fail_all_deducts(&self) {
        self.fail_deducts.store(true, Ordering::SeqCst);
    }

    pub fn deduct_count(&self) -> usize {
        self.deducts.lock().unwrap().len()
    }

    pub fn total_deducted(&self) -> i64 {
        self.deducts.lock().unwrap().iter().map(|(amount, _)| amount).sum()
    }

    pub fn current_balance(&self) -> i64 {
        *self.balance.lock().unwrap()
    }
}

#[async_trait]
impl BalanceApi for MockBalanceApi {
    async fn get_balance(&self) -> Result<i64, CoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock().unwrap())
    }

    async fn deduct_for_ride(
        &self,
        amount: i64,
        _vehicle_name: &str,
        seconds: u64,
    ) -> Result<DeductOutcome, CoreError> {
        if self.fail_deducts.load(Ordering::SeqCst) {
            return Err(CoreError::Billing("simulated backend failure".to_string()));
        }

        let mut balance = self.balance.lock().unwrap();
        if self.refuse_deducts.load(Ordering::SeqCst) || *balance < amount {
            return Ok(DeductOutcome {
                success: false,
                new_balance: *balance,
                error: Some("insufficient funds".to_string()),
            });
        }

        *balance -= amount;
        self.deducts.lock().unwrap().push((amount, seconds));
        Ok(DeductOutcome { success: true, new_balance: *balance, error: None })
    }
}

/// Catálogo simulado
pub struct MockVehicleApi {
    pub detail: Mutex<VehicleDetail>,
    pub release_calls: AtomicUsize,
    fail_gets: AtomicBool,
    fail_releases: AtomicBool,
}

impl MockVehicleApi {
    pub fn new(detail: VehicleDetail) -> Self {
        Self {
            detail: Mutex::new(detail),
            release_calls: AtomicUsize::new(0),
            fail_gets: AtomicBool::new(false),
            fail_releases: AtomicBool::new(false),
        }
    }

    pub fn fail_gets(&self) {
        self.fail_gets.store(true, Ordering::SeqCst);
    }

    pub fn fail_releases(&self) {
        self.fail_releases.store(true, Ordering::SeqCst);
    }

    pub fn release_count(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VehicleApi for MockVehicleApi {
    async fn get_vehicle(&self, _vehicle_id: Uuid) -> Result<VehicleDetail, CoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CoreError::ExternalApi("simulated catalog outage".to_string()));
        }
        Ok(self.detail.lock().unwrap().clone())
    }

    async fn release_after_ride(&self, _vehicle_id: Uuid) -> Result<ReleaseOutcome, CoreError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(CoreError::ReleaseFailed("simulated release failure".to_string()));
        }
        Ok(ReleaseOutcome { success: true, message: None })
    }
}

/// Surface REST de reservas simulado con enforcement del servidor
pub struct MockReservationApi {
    user_id: Uuid,
    /// Duración del hold en milisegundos (acortable para pruebas)
    hold_ms: i64,
    pub active: Mutex<Option<Reservation>>,
    pub create_calls: AtomicUsize,
    pub use_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    refuse_creates: AtomicBool,
}

impl MockReservationApi {
    pub fn new(hold_ms: i64) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            hold_ms,
            active: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            use_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            refuse_creates: AtomicBool::new(false),
        }
    }

    pub fn refuse_creates(&self) {
        self.refuse_creates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReservationApi for MockReservationApi {
    async fn create(&self, vehicle_id: Uuid) -> Result<Reservation, CoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_creates.load(Ordering::SeqCst) {
            return Err(CoreError::NoUnitsAvailable(vehicle_id.to_string()));
        }

        let mut active = self.active.lock().unwrap();
        if active.as_ref().is_some_and(|r| r.status == ReservationStatus::Active) {
            return Err(CoreError::ReservationAlreadyActive);
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            vehicle_id,
            unit_id: Some(Uuid::new_v4()),
            created_at: now,
            expires_at: now + ChronoDuration::milliseconds(self.hold_ms),
            status: ReservationStatus::Active,
        };
        *active = Some(reservation.clone());
        Ok(reservation)
    }

    async fn cancel(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock().unwrap();
        match active.take() {
            Some(mut r) if r.id == reservation_id => {
                r.status = ReservationStatus::Canceled;
                Ok(r)
            }
            other => {
                *active = other;
                Err(CoreError::ReservationNotActive(reservation_id.to_string()))
            }
        }
    }

    async fn use_reservation(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        self.use_calls.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock().unwrap();
        match active.take() {
            Some(mut r) if r.id == reservation_id => {
                // enforcement autoritativo del servidor
                if Utc::now() >= r.expires_at {
                    return Err(CoreError::ReservationExpired(reservation_id.to_string()));
                }
                r.status = ReservationStatus::Used;
                Ok(r)
            }
            other => {
                *active = other;
                Err(CoreError::ReservationNotActive(reservation_id.to_string()))
            }
        }
    }

    async fn get_active(&self) -> Result<Option<Reservation>, CoreError> {
        Ok(self.active.lock().unwrap().clone())
    }

    async fn list(&self) -> Result<Vec<Reservation>, CoreError> {
        Ok(self.active.lock().unwrap().clone().into_iter().collect())
    }
}

/// Servicio de nivel simulado
pub struct MockLevelApi {
    level: AtomicUsize,
}

impl MockLevelApi {
    pub fn new(level: u32) -> Self {
        Self { level: AtomicUsize::new(level as usize) }
    }
}

#[async_trait]
impl UserLevelApi for MockLevelApi {
    async fn get_user_level(&self) -> Result<u32, CoreError> {
        Ok(self.level.load(Ordering::SeqCst) as u32)
    }
}

/// Ficha de vehículo de prueba
pub fn test_vehicle(price_per_minute: i64, min_level: u32) -> VehicleDetail {
    VehicleDetail {
        id: Uuid::new_v4(),
        name: "Speedster MK2".to_string(),
        price_per_minute,
        min_level_required: min_level,
        battery_level: 87,
        top_speed: 45,
        status: UnitStatus::Available,
    }
}
