//! Servicio de saldo del usuario
//!
//! Cliente HTTP del monedero de monedas. Tras cualquier cobro, el saldo
//! que devuelve este servicio es la única fuente de verdad: nunca se
//! calcula localmente por resta.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::utils::errors::CoreError;

/// Resultado de un cobro por ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductOutcome {
    pub success: bool,
    pub new_balance: i64,
    pub error: Option<String>,
}

/// Contrato del monedero
#[async_trait]
pub trait BalanceApi: Send + Sync {
    /// Saldo actual en monedas enteras
    async fn get_balance(&self) -> Result<i64, CoreError>;

    /// Cobrar `amount` monedas por `seconds` segundos de conducción.
    ///
    /// Un resultado con `success: false` significa fondos insuficientes
    /// u otro rechazo del backend; el ride debe pararse de inmediato.
    async fn deduct_for_ride(
        &self,
        amount: i64,
        vehicle_name: &str,
        seconds: u64,
    ) -> Result<DeductOutcome, CoreError>;
}

#[derive(Debug, Serialize)]
struct DeductRequest<'a> {
    amount: i64,
    vehicle_name: &'a str,
    seconds: u64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: i64,
}

/// Cliente HTTP del monedero
pub struct HttpBalanceService {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpBalanceService {
    pub fn new(base_url: String, bearer_token: String, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url, bearer_token }
    }
}

#[async_trait]
impl BalanceApi for HttpBalanceService {
    async fn get_balance(&self) -> Result<i64, CoreError> {
        let url = format!("{}/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::ExternalApi(format!("get_balance returned {}", status)));
        }

        let body: BalanceResponse = response.json().await?;
        log::info!("💰 Saldo actual: {} monedas", body.balance);
        Ok(body.balance)
    }

    async fn deduct_for_ride(
        &self,
        amount: i64,
        vehicle_name: &str,
        seconds: u64,
    ) -> Result<DeductOutcome, CoreError> {
        let url = format!("{}/balance/deduct", self.base_url);
        log::info!("💸 Cobrando {} monedas ({} s en {})", amount, seconds, vehicle_name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&DeductRequest { amount, vehicle_name, seconds })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::Billing(format!("deduct_for_ride returned {}", status)));
        }

        let outcome: DeductOutcome = response.json().await?;
        if !outcome.success {
            log::warn!(
                "❌ Cobro rechazado: {}",
                outcome.error.as_deref().unwrap_or("insufficient funds")
            );
        }
        Ok(outcome)
    }
}
