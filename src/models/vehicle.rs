//! Modelos de Vehicle y VehicleUnit
//!
//! Este módulo contiene el vehículo abstracto (tipo con precio y specs)
//! y la unidad física rentable, tal como los expone el catálogo REST.
//! El estado de la unidad es autoritativo del servidor: el cliente solo
//! lo solicita y, como mucho, mantiene una pista optimista reconciliable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de una unidad física - mapea al ENUM unit_status del backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Reserved,
    InUse,
    Maintenance,
}

/// Unidad física rentable de un vehículo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleUnit {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub status: UnitStatus,
    /// Usuario que tiene la unidad reservada o en uso, si hay alguno
    pub current_holder: Option<Uuid>,
    pub battery_pct: u8,
    pub updated_at: DateTime<Utc>,
}

/// Detalle del vehículo (tipo abstracto con precio y specs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDetail {
    pub id: Uuid,
    pub name: String,
    /// Precio en monedas enteras por minuto de conducción
    pub price_per_minute: i64,
    /// Nivel mínimo de cuenta exigido para reservar o arrancar
    pub min_level_required: u32,
    pub battery_level: u8,
    pub top_speed: u32,
    pub status: UnitStatus,
}

/// Resultado de liberar la unidad al terminar un ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub success: bool,
    pub message: Option<String>,
}

/// Estado de unidad etiquetado como pista optimista o confirmado.
///
/// Una mutación local (p.ej. asumir que la unidad queda libre justo al
/// cancelar) se guarda como `Hint` y debe reconciliarse contra la
/// siguiente lectura autoritativa, que la reemplaza por `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    Hint(UnitStatus),
    Confirmed(UnitStatus),
}

impl StatusHint {
    pub fn status(&self) -> UnitStatus {
        match self {
            StatusHint::Hint(s) | StatusHint::Confirmed(s) => *s,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, StatusHint::Confirmed(_))
    }

    /// Reconciliar la pista con una lectura autoritativa del servidor
    pub fn reconcile(&mut self, authoritative: UnitStatus) {
        *self = StatusHint::Confirmed(authoritative);
    }
}
