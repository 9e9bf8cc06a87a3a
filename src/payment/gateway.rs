//! HTTP client for the third-party payment gateway

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;

/// A payment intent as returned by the gateway
#[derive(Debug, Deserialize)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

/// Thin client for the gateway's REST API
#[derive(Clone)]
pub struct PaymentGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Create a payment intent for an order. The gateway echoes the order id
    /// back in webhook metadata, which keeps reconciliation possible even if
    /// the local insert races the first webhook.
    pub async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        order_id: Uuid,
    ) -> Result<GatewayIntent, ApiError> {
        let url = format!("{}/v1/payment_intents", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "amount": amount_cents,
                "currency": currency,
                "metadata": { "order_id": order_id },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Payment gateway rejected intent creation");
            return Err(ApiError::GatewayError(format!(
                "Gateway returned {}",
                status
            )));
        }

        let intent = response.json::<GatewayIntent>().await?;

        tracing::info!(
            provider_ref = %intent.id,
            amount_cents,
            currency,
            "Payment intent created"
        );

        Ok(intent)
    }
}
