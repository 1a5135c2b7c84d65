//! Servicio de catálogo de vehículos
//!
//! Cliente HTTP para el detalle del vehículo y la liberación de la
//! unidad al terminar un ride. El estado de la unidad es siempre
//! autoritativo del servidor.

use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

use crate::models::{ReleaseOutcome, VehicleDetail};
use crate::utils::errors::CoreError;

/// Contrato del catálogo de vehículos
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Obtener el detalle del vehículo (precio, nivel mínimo, specs)
    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<VehicleDetail, CoreError>;

    /// Liberar la unidad del vehículo al terminar el ride
    async fn release_after_ride(&self, vehicle_id: Uuid) -> Result<ReleaseOutcome, CoreError>;
}

/// Cliente HTTP del catálogo
pub struct HttpVehicleService {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpVehicleService {
    pub fn new(base_url: String, bearer_token: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url, bearer_token }
    }
}

#[async_trait]
impl VehicleApi for HttpVehicleService {
    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<VehicleDetail, CoreError> {
        let url = format!("{}/vehicles/{}", self.base_url, vehicle_id);
        log::info!("🚗 Obteniendo detalle del vehículo: {}", vehicle_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::ExternalApi(format!(
                "get_vehicle {} returned {}",
                vehicle_id, status
            )));
        }

        let detail: VehicleDetail = response.json().await?;
        Ok(detail)
    }

    async fn release_after_ride(&self, vehicle_id: Uuid) -> Result<ReleaseOutcome, CoreError> {
        let url = format!("{}/vehicles/{}/release", self.base_url, vehicle_id);
        log::info!("🔓 Liberando unidad del vehículo: {}", vehicle_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::ReleaseFailed(format!(
                "release for {} returned {}",
                vehicle_id, status
            )));
        }

        let outcome: ReleaseOutcome = response.json().await?;
        if !outcome.success {
            return Err(CoreError::ReleaseFailed(
                outcome.message.unwrap_or_else(|| "release rejected".to_string()),
            ));
        }

        Ok(outcome)
    }
}
