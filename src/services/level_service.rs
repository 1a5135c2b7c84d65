//! Servicio de nivel de usuario
//!
//! El gate de nivel mínimo por vehículo se comprueba antes de reservar o
//! de arrancar en directo, independientemente del saldo.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::utils::errors::CoreError;

/// Contrato del servicio de nivel de cuenta
#[async_trait]
pub trait UserLevelApi: Send + Sync {
    async fn get_user_level(&self) -> Result<u32, CoreError>;
}

#[derive(Debug, Deserialize)]
struct LevelResponse {
    level: u32,
}

/// Cliente HTTP del servicio de nivel
pub struct HttpLevelService {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpLevelService {
    pub fn new(base_url: String, bearer_token: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url, bearer_token }
    }
}

#[async_trait]
impl UserLevelApi for HttpLevelService {
    async fn get_user_level(&self) -> Result<u32, CoreError> {
        let url = format!("{}/users/me/level", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::ExternalApi(format!("get_user_level returned {}", status)));
        }

        let body: LevelResponse = response.json().await?;
        Ok(body.level)
    }
}
