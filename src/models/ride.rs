//! Modelos del ride activo
//!
//! Estado derivado del lado cliente para la sesión de conducción: no es
//! una entidad del backend más allá del loop de facturación.

use serde::{Deserialize, Serialize};

/// Motivo de terminación del ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// El usuario confirmó la parada
    UserConfirmed,
    /// Parada forzada por saldo agotado o fallo de cobro
    BalanceExhausted,
    /// El usuario abandonó la pantalla o la conexión terminó la sesión
    Disconnected,
}

impl StopReason {
    /// Mensaje presentable al usuario; la parada forzada se distingue
    /// de la manual aunque ambas convergen en el mismo settlement.
    pub fn user_message(&self) -> &'static str {
        match self {
            StopReason::UserConfirmed => "Ride finished. Thanks for driving!",
            StopReason::BalanceExhausted => "Ride stopped: your balance ran out.",
            StopReason::Disconnected => "Ride ended because the session closed.",
        }
    }
}

/// Foto instantánea del ride para la UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSnapshot {
    pub vehicle_name: String,
    pub price_per_minute: i64,
    pub elapsed_seconds: u64,
    pub running: bool,
    /// Snapshot del saldo tras el último cobro autoritativo
    pub balance: i64,
    /// floor(balance / price_per_minute) * 60
    pub max_ride_seconds: u64,
}

/// Resultado final de un ride ya liquidado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    pub vehicle_name: String,
    pub elapsed_seconds: u64,
    /// Minutos facturados: ceil(elapsed_seconds / 60)
    pub minutes_billed: u64,
    /// Coste total en monedas: minutes_billed * price_per_minute
    pub total_cost: i64,
    pub final_balance: i64,
    pub reason: StopReason,
}

/// Minutos completos o empezados de una duración en segundos
pub fn ceil_minutes(seconds: u64) -> u64 {
    seconds.div_ceil(60)
}

/// Segundos de conducción que cubre un saldo a un precio dado
pub fn max_ride_seconds(balance: i64, price_per_minute: i64) -> u64 {
    if price_per_minute <= 0 || balance <= 0 {
        return 0;
    }
    (balance / price_per_minute) as u64 * 60
}
