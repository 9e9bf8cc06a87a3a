//! Payment HTTP handlers, including the gateway webhook

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::payment::{
    webhook, CreatePaymentRequest, Payment, PaymentIntentResponse, WebhookAck, WebhookEvent,
};
use crate::state::AppState;

/// POST /payments - Create a payment intent for a pending order
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentIntentResponse>), ApiError> {
    let intent = state
        .payment_service
        .create_payment(user.user_id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(intent)))
}

/// GET /payments/:id - Fetch one payment
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state
        .payment_service
        .get_payment(id, user.user_id, user.role)
        .await?;

    Ok(Json(payment))
}

/// POST /payments/webhook - Gateway event delivery
///
/// Authenticated by HMAC signature, not by bearer token. The raw body bytes
/// are what the signature covers, so this handler takes `Bytes` and parses
/// JSON itself after verification.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let secret = match state.webhook_secret.as_deref() {
        Some(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::error!("PAYMENT_WEBHOOK_SECRET is not set; refusing webhook delivery");
            return Err(ApiError::ServiceUnavailable(
                "Webhook processing is not configured".to_string(),
            ));
        }
    };

    let header = headers
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;

    webhook::verify_signature(secret.as_bytes(), header, &body, Utc::now().timestamp()).map_err(
        |err| {
            tracing::warn!(error = %err, "Rejected webhook delivery");
            ApiError::Unauthorized("Invalid webhook signature".to_string())
        },
    )?;

    let event: WebhookEvent = serde_json::from_slice(&body)?;
    let payload: serde_json::Value = serde_json::from_slice(&body)?;

    let outcome = state
        .payment_service
        .process_webhook_event(&event, payload)
        .await?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        outcome = ?outcome,
        "Webhook event handled"
    );

    Ok(Json(WebhookAck { received: true }))
}
