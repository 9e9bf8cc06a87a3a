//! Payment service - intent creation and webhook-driven state updates

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::UserRole;
use crate::order::{Order, OrderStatus};
use crate::payment::gateway::PaymentGateway;
use crate::payment::model::{
    CreatePaymentRequest, Payment, PaymentIntentResponse, PaymentStatus, WebhookEvent,
    WebhookOutcome,
};

#[derive(Clone)]
pub struct PaymentService {
    db_pool: PgPool,
    gateway: PaymentGateway,
}

impl PaymentService {
    pub fn new(db_pool: PgPool, gateway: PaymentGateway) -> Self {
        Self { db_pool, gateway }
    }

    /// Start a payment for a pending order. Only the order's customer; the
    /// amount and currency always come from the order row.
    pub async fn create_payment(
        &self,
        actor_id: Uuid,
        request: CreatePaymentRequest,
    ) -> Result<PaymentIntentResponse, ApiError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(request.order_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Order not found".to_string()))?;

        if order.customer_id != actor_id {
            return Err(ApiError::Forbidden(
                "Only the order's customer can pay for it".to_string(),
            ));
        }

        if order.status != OrderStatus::Pending {
            return Err(ApiError::UnprocessableEntity(format!(
                "Only pending orders can be paid (order is '{}')",
                order.status.as_str()
            )));
        }

        if let Some(existing) = self.live_payment_for(order.id).await? {
            return Err(ApiError::Conflict(format!(
                "A payment already exists for this order (intent {})",
                existing.provider_ref
            )));
        }

        let intent = self
            .gateway
            .create_intent(order.total_cents, &order.currency, order.id)
            .await?;

        // The partial unique index on (order_id) catches two customers' tabs
        // racing each other; the loser gets the same 409 as the pre-check.
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, order_id, provider_ref, amount_cents, currency, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(&intent.id)
        .bind(order.total_cents)
        .bind(&order.currency)
        .bind(PaymentStatus::Pending)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                tracing::warn!(
                    order_id = %order.id,
                    provider_ref = %intent.id,
                    "Concurrent payment creation lost the race; intent is orphaned at the gateway"
                );
                ApiError::Conflict("A payment already exists for this order".to_string())
            }
            _ => e.into(),
        })?;

        Ok(PaymentIntentResponse {
            payment,
            client_secret: intent.client_secret,
        })
    }

    /// Fetch a payment, visible to the order's customer, the business owner,
    /// or an admin.
    pub async fn get_payment(
        &self,
        id: Uuid,
        viewer_id: Uuid,
        viewer_role: UserRole,
    ) -> Result<Payment, ApiError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Payment not found".to_string()))?;

        if viewer_role == UserRole::Admin {
            return Ok(payment);
        }

        let (customer_id, owner_id): (Uuid, Uuid) = sqlx::query_as(
            r#"
            SELECT o.customer_id, b.owner_id
            FROM orders o
            JOIN businesses b ON b.id = o.business_id
            WHERE o.id = $1
            "#,
        )
        .bind(payment.order_id)
        .fetch_one(&self.db_pool)
        .await?;

        if customer_id != viewer_id && owner_id != viewer_id {
            return Err(ApiError::Forbidden(
                "You are not a party to this payment".to_string(),
            ));
        }

        Ok(payment)
    }

    /// Apply a verified webhook event.
    ///
    /// The dedupe insert and the state changes share one transaction: if
    /// processing fails, the event id is not recorded and the gateway's
    /// retry gets a clean attempt.
    pub async fn process_webhook_event(
        &self,
        event: &WebhookEvent,
        payload: serde_json::Value,
    ) -> Result<WebhookOutcome, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (id, event_id, event_type, payload, received_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.id)
        .bind(&event.event_type)
        .bind(payload)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            tracing::info!(event_id = %event.id, "Duplicate webhook event ignored");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                self.apply_success(&mut tx, &event.data.provider_ref).await?
            }
            "payment_intent.payment_failed" => {
                self.apply_failure(
                    &mut tx,
                    &event.data.provider_ref,
                    event.data.failure_reason.as_deref(),
                )
                .await?
            }
            other => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %other,
                    "Unhandled webhook event type acknowledged"
                );
                WebhookOutcome::Ignored
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Mark a payment succeeded and confirm its order if still pending
    async fn apply_success(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        provider_ref: &str,
    ) -> Result<WebhookOutcome, ApiError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE provider_ref = $1 FOR UPDATE",
        )
        .bind(provider_ref)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(payment) = payment else {
            tracing::warn!(%provider_ref, "Webhook references an unknown payment intent");
            return Ok(WebhookOutcome::UnknownRef);
        };

        if payment.status == PaymentStatus::Succeeded {
            tracing::info!(payment_id = %payment.id, "Payment already succeeded; no-op");
            return Ok(WebhookOutcome::Processed);
        }

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'succeeded', paid_at = NOW(), failure_reason = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .execute(&mut **tx)
        .await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(payment.order_id)
            .fetch_one(&mut **tx)
            .await?;

        if order.status == OrderStatus::Pending {
            sqlx::query("UPDATE orders SET status = 'confirmed', updated_at = NOW() WHERE id = $1")
                .bind(order.id)
                .execute(&mut **tx)
                .await?;

            tracing::info!(
                payment_id = %payment.id,
                order_id = %order.id,
                reference = %order.reference,
                "Payment succeeded; order confirmed"
            );
        } else {
            tracing::warn!(
                payment_id = %payment.id,
                order_id = %order.id,
                order_status = %order.status.as_str(),
                "Payment succeeded but order is no longer pending; order left as-is"
            );
        }

        Ok(WebhookOutcome::Processed)
    }

    /// Mark a payment failed. A payment that already succeeded is never
    /// downgraded.
    async fn apply_failure(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        provider_ref: &str,
        failure_reason: Option<&str>,
    ) -> Result<WebhookOutcome, ApiError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE provider_ref = $1 FOR UPDATE",
        )
        .bind(provider_ref)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(payment) = payment else {
            tracing::warn!(%provider_ref, "Webhook references an unknown payment intent");
            return Ok(WebhookOutcome::UnknownRef);
        };

        if payment.status == PaymentStatus::Succeeded {
            tracing::warn!(
                payment_id = %payment.id,
                "Failure event for a payment that already succeeded; ignored"
            );
            return Ok(WebhookOutcome::Processed);
        }

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', failure_reason = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(failure_reason.unwrap_or("unknown"))
        .bind(payment.id)
        .execute(&mut **tx)
        .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            failure_reason = %failure_reason.unwrap_or("unknown"),
            "Payment failed"
        );

        Ok(WebhookOutcome::Processed)
    }

    async fn live_payment_for(&self, order_id: Uuid) -> Result<Option<Payment>, ApiError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = $1 AND status <> 'failed'",
        )
        .bind(order_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(payment)
    }
}
