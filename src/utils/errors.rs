//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del núcleo de sesión
//! y su conversión a mensajes presentables al usuario.

use thiserror::Error;

/// Errores principales del núcleo de sesión
#[derive(Error, Debug)]
pub enum CoreError {
    // --- Rechazos por precondición (nunca se reintentan solos) ---
    #[error("Insufficient level: vehicle requires level {required}, user has {actual}")]
    InsufficientLevel { required: u32, actual: u32 },

    #[error("Insufficient balance: need {required} coins, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("User already has an active reservation")]
    ReservationAlreadyActive,

    #[error("No available units for vehicle {0}")]
    NoUnitsAvailable(String),

    #[error("Reservation {0} is not active")]
    ReservationNotActive(String),

    #[error("Reservation {0} has expired")]
    ReservationExpired(String),

    // --- Transporte ---
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Transport is busy with vehicle {0}")]
    TransportBusy(String),

    // --- Facturación ---
    #[error("Billing error: {0}")]
    Billing(String),

    #[error("Ride is not running")]
    RideNotRunning,

    // --- Colaboradores externos ---
    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Unit release failed: {0}")]
    ReleaseFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Indica si el error es un rechazo por precondición que el usuario
    /// puede resolver (recargar saldo, esperar, elegir otro vehículo).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientLevel { .. }
                | CoreError::InsufficientBalance { .. }
                | CoreError::ReservationAlreadyActive
                | CoreError::NoUnitsAvailable(_)
                | CoreError::ReservationNotActive(_)
                | CoreError::ReservationExpired(_)
        )
    }

    /// Mensaje presentable al usuario con el siguiente paso accionable
    pub fn user_message(&self) -> String {
        match self {
            CoreError::InsufficientLevel { required, .. } => {
                format!("This vehicle requires level {}. Keep riding to level up!", required)
            }
            CoreError::InsufficientBalance { required, available } => {
                format!(
                    "You need at least {} coins to start (you have {}). Please top up your balance.",
                    required, available
                )
            }
            CoreError::ReservationAlreadyActive => {
                "You already have an active reservation. Use or cancel it first.".to_string()
            }
            CoreError::NoUnitsAvailable(_) => {
                "All units of this vehicle are busy right now. Try another one or come back later."
                    .to_string()
            }
            CoreError::ReservationNotActive(_) | CoreError::ReservationExpired(_) => {
                "Your reservation is no longer valid. Please reserve again.".to_string()
            }
            CoreError::Transport(_) | CoreError::Signaling(_) | CoreError::TransportBusy(_) => {
                "Connection to the vehicle was lost. Please try reconnecting.".to_string()
            }
            CoreError::Billing(_) => {
                "Your ride was stopped because the payment could not be processed.".to_string()
            }
            CoreError::RideNotRunning => {
                "The ride state changed. Please refresh and try again.".to_string()
            }
            CoreError::ExternalApi(_) | CoreError::Internal(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            CoreError::ReleaseFailed(_) => {
                "Your ride was settled, but the vehicle is taking a moment to free up.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::ExternalApi(e.to_string())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(e: anyhow::Error) -> Self {
        CoreError::Internal(e.to_string())
    }
}
