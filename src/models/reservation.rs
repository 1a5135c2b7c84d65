//! Modelo de Reservation
//!
//! Una reserva es un claim exclusivo y acotado en el tiempo sobre un
//! vehículo, resuelto a una unidad concreta por el servidor. Una vez que
//! deja de estar activa es inmutable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de la reserva - mapea al ENUM reservation_status del backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Expired,
    Used,
    Canceled,
}

/// Reserva de un vehículo acotada en el tiempo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_id: Uuid,
    /// Unidad asignada por el servidor; en la práctica siempre viene
    /// ligada en la creación, pero el contrato la permite diferida
    pub unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Construir una reserva activa con la duración de hold indicada
    pub fn new_active(
        user_id: Uuid,
        vehicle_id: Uuid,
        unit_id: Option<Uuid>,
        hold_minutes: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            vehicle_id,
            unit_id,
            created_at: now,
            expires_at: now + Duration::minutes(hold_minutes),
            status: ReservationStatus::Active,
        }
    }

    /// La reserva sigue siendo usable en el instante `now`.
    ///
    /// Aplica el chequeo de expiración del lado cliente aunque el
    /// servidor todavía no haya volcado el estado a `expired`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && now < self.expires_at
    }

    /// Segundos restantes de hold, saturado en cero
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
