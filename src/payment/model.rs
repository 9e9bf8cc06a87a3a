//! Payment models and gateway webhook payloads

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Payment model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    /// The gateway's payment-intent id
    pub provider_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment lifecycle states
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Request DTO for starting a payment
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
}

/// Response for a freshly created payment intent. The client secret is what
/// the SPA hands to the gateway's JS SDK; it is never stored.
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    #[serde(flatten)]
    pub payment: Payment,
    pub client_secret: String,
}

/// Inbound webhook event from the payment gateway
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// The gateway's event id, used for dedupe
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

/// Event payload fields we act on
#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub provider_ref: String,
    pub failure_reason: Option<String>,
}

/// Webhook acknowledgement body
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// What processing a webhook event amounted to; the HTTP answer is 200
/// either way, the distinction is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event applied to a payment (and possibly its order)
    Processed,
    /// Event id seen before; nothing done
    Duplicate,
    /// Event type we do not handle
    Ignored,
    /// provider_ref matches no payment row
    UnknownRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_event_parsing() {
        let body = r#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "provider_ref": "pi_123" }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.provider_ref, "pi_123");
        assert!(event.data.failure_reason.is_none());

        let failed = r#"{
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": { "provider_ref": "pi_123", "failure_reason": "card_declined" }
        }"#;
        let event: WebhookEvent = serde_json::from_str(failed).unwrap();
        assert_eq!(event.data.failure_reason.as_deref(), Some("card_declined"));
    }
}
