//! Cliente HTTP del API REST de reservas
//!
//! Este módulo contiene el cliente del surface create/cancel/use/
//! get-active/list, identificado por bearer token. Un 404 en get-active
//! es el resultado normal "sin reserva", no un error.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Reservation;
use crate::utils::errors::CoreError;

/// Contrato del surface REST de reservas
#[async_trait]
pub trait ReservationApi: Send + Sync {
    /// Crear una reserva para el vehículo indicado
    async fn create(&self, vehicle_id: Uuid) -> Result<Reservation, CoreError>;

    /// Cancelar una reserva activa
    async fn cancel(&self, reservation_id: Uuid) -> Result<Reservation, CoreError>;

    /// Consumir la reserva para arrancar un ride
    async fn use_reservation(&self, reservation_id: Uuid) -> Result<Reservation, CoreError>;

    /// Reserva activa del usuario, si existe (404 => None)
    async fn get_active(&self) -> Result<Option<Reservation>, CoreError>;

    /// Historial de reservas del usuario
    async fn list(&self) -> Result<Vec<Reservation>, CoreError>;
}

#[derive(Debug, Serialize)]
struct CreateReservationRequest {
    vehicle_id: Uuid,
}

/// Cuerpo de error del backend: `{"error": {"code", "message"}}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Cliente HTTP de reservas
pub struct HttpReservationService {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpReservationService {
    pub fn new(base_url: String, bearer_token: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url, bearer_token }
    }

    /// Mapear un cuerpo de error del backend al rechazo correspondiente
    async fn refusal_from(response: reqwest::Response, vehicle_id: Option<Uuid>) -> CoreError {
        let status = response.status();
        let body: Option<ApiErrorBody> = response.json().await.ok();

        match body {
            Some(b) => match b.error.code.as_str() {
                "RESERVATION_ACTIVE" => CoreError::ReservationAlreadyActive,
                "NO_UNITS_AVAILABLE" => CoreError::NoUnitsAvailable(
                    vehicle_id.map(|v| v.to_string()).unwrap_or_default(),
                ),
                "RESERVATION_NOT_ACTIVE" => CoreError::ReservationNotActive(
                    b.error.message.unwrap_or_default(),
                ),
                "RESERVATION_EXPIRED" => {
                    CoreError::ReservationExpired(b.error.message.unwrap_or_default())
                }
                code => CoreError::ExternalApi(format!("reservation API error {}: {}", status, code)),
            },
            None => CoreError::ExternalApi(format!("reservation API returned {}", status)),
        }
    }
}

#[async_trait]
impl ReservationApi for HttpReservationService {
    async fn create(&self, vehicle_id: Uuid) -> Result<Reservation, CoreError> {
        let url = format!("{}/reservations", self.base_url);
        log::info!("📋 Creando reserva para vehículo {}", vehicle_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&CreateReservationRequest { vehicle_id })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::refusal_from(response, Some(vehicle_id)).await);
        }

        Ok(response.json().await?)
    }

    async fn cancel(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        let url = format!("{}/reservations/{}/cancel", self.base_url, reservation_id);
        log::info!("🚫 Cancelando reserva {}", reservation_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::refusal_from(response, None).await);
        }

        Ok(response.json().await?)
    }

    async fn use_reservation(&self, reservation_id: Uuid) -> Result<Reservation, CoreError> {
        let url = format!("{}/reservations/{}/use", self.base_url, reservation_id);
        log::info!("✅ Consumiendo reserva {}", reservation_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::refusal_from(response, None).await);
        }

        Ok(response.json().await?)
    }

    async fn get_active(&self) -> Result<Option<Reservation>, CoreError> {
        let url = format!("{}/reservations/active", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        // 404 es el caso normal "sin reserva activa"
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(Self::refusal_from(response, None).await);
        }

        Ok(Some(response.json().await?))
    }

    async fn list(&self) -> Result<Vec<Reservation>, CoreError> {
        let url = format!("{}/reservations", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::refusal_from(response, None).await);
        }

        Ok(response.json().await?)
    }
}
