//! Order service - creation with server-computed totals and the status
//! state machine

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::business::Business;
use crate::error::ApiError;
use crate::models::{PaginatedResponse, PaginationParams, UserRole};
use crate::order::model::{
    CreateOrderRequest, ListOrdersQuery, Order, OrderItem, OrderResponse, OrderStatus,
};
use crate::product::Product;

const REFERENCE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct OrderService {
    db_pool: PgPool,
}

impl OrderService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Place an order. Prices and the total are computed server-side from the
    /// product catalog; anything price-like in the request is ignored.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ApiError> {
        let mut seen = HashSet::new();
        for item in &request.items {
            if item.quantity < 1 {
                return Err(ApiError::ValidationError(format!(
                    "Quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if !seen.insert(item.product_id) {
                return Err(ApiError::ValidationError(format!(
                    "Product {} appears more than once",
                    item.product_id
                )));
            }
        }

        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(request.business_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Business not found".to_string()))?;

        if !business.is_active {
            return Err(ApiError::UnprocessableEntity(
                "This business is not accepting orders".to_string(),
            ));
        }

        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        let products: Vec<Product> = sqlx::query_as(
            "SELECT * FROM products WHERE id = ANY($1) AND business_id = $2",
        )
        .bind(&product_ids)
        .bind(business.id)
        .fetch_all(&self.db_pool)
        .await?;

        let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut total_cents: i64 = 0;
        let mut lines: Vec<(Uuid, String, i64, i32)> = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = by_id.get(&item.product_id).ok_or_else(|| {
                ApiError::UnprocessableEntity(format!(
                    "Product {} does not belong to this business",
                    item.product_id
                ))
            })?;

            if !product.is_available {
                return Err(ApiError::UnprocessableEntity(format!(
                    "Product '{}' is currently unavailable",
                    product.name
                )));
            }

            let line_total = product
                .price_cents
                .checked_mul(i64::from(item.quantity))
                .ok_or_else(|| {
                    ApiError::BadRequest("Order total is out of range".to_string())
                })?;
            total_cents = total_cents.checked_add(line_total).ok_or_else(|| {
                ApiError::BadRequest("Order total is out of range".to_string())
            })?;

            lines.push((
                product.id,
                product.name.clone(),
                product.price_cents,
                item.quantity,
            ));
        }

        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        // Reference collisions are astronomically unlikely but cheap to retry
        let mut last_err: Option<ApiError> = None;
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = generate_reference();

            match self
                .insert_order(customer_id, &business, &reference, total_cents, note, &lines)
                .await
            {
                Ok(response) => {
                    tracing::info!(
                        order_id = %response.order.id,
                        reference = %response.order.reference,
                        business_id = %business.id,
                        total_cents,
                        "Order placed"
                    );
                    return Ok(response);
                }
                Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                    last_err = Some(ApiError::Conflict(
                        "Could not allocate an order reference".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| ApiError::InternalError("Order insert failed".to_string())))
    }

    /// Insert the order row and its items in one transaction
    async fn insert_order(
        &self,
        customer_id: Uuid,
        business: &Business,
        reference: &str,
        total_cents: i64,
        note: Option<&str>,
        lines: &[(Uuid, String, i64, i32)],
    ) -> Result<OrderResponse, sqlx::Error> {
        let mut tx = self.db_pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, reference, customer_id, business_id, status, total_cents,
                currency, note, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reference)
        .bind(customer_id)
        .bind(business.id)
        .bind(OrderStatus::Pending)
        .bind(total_cents)
        .bind(&business.currency)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (product_id, product_name, unit_price_cents, quantity) in lines {
            let item = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, unit_price_cents,
                    quantity, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(product_id)
            .bind(product_name)
            .bind(unit_price_cents)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        Ok(OrderResponse { order, items })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, ApiError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Order not found".to_string()))
    }

    /// Fetch a single order with items, enforcing visibility: the customer of
    /// record, the owner of the business, or an admin.
    pub async fn get_order_for_viewer(
        &self,
        id: Uuid,
        viewer_id: Uuid,
        viewer_role: UserRole,
    ) -> Result<OrderResponse, ApiError> {
        let order = self.get_order(id).await?;
        self.authorize_view(&order, viewer_id, viewer_role).await?;

        let items = self.items_for(order.id).await?;
        Ok(OrderResponse { order, items })
    }

    /// List orders scoped to the viewer: customers see their own, owners see
    /// their businesses', admins see everything.
    pub async fn list_orders(
        &self,
        viewer_id: Uuid,
        viewer_role: UserRole,
        query: ListOrdersQuery,
    ) -> Result<PaginatedResponse<Order>, ApiError> {
        if let Some(business_id) = query.business_id {
            if viewer_role == UserRole::Owner {
                let owner_id: Option<Uuid> = sqlx::query_scalar(
                    "SELECT owner_id FROM businesses WHERE id = $1",
                )
                .bind(business_id)
                .fetch_optional(&self.db_pool)
                .await?;

                match owner_id {
                    Some(owner) if owner == viewer_id => {}
                    Some(_) => {
                        return Err(ApiError::Forbidden(
                            "You do not manage this business".to_string(),
                        ))
                    }
                    None => return Err(ApiError::NotFound("Business not found".to_string())),
                }
            }
        }

        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };

        let mut query_builder = sqlx::QueryBuilder::new("SELECT * FROM orders WHERE 1=1");
        let mut count_builder = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE 1=1");

        match viewer_role {
            UserRole::Customer => {
                query_builder.push(" AND customer_id = ");
                query_builder.push_bind(viewer_id);
                count_builder.push(" AND customer_id = ");
                count_builder.push_bind(viewer_id);
            }
            UserRole::Owner => {
                query_builder.push(" AND business_id IN (SELECT id FROM businesses WHERE owner_id = ");
                query_builder.push_bind(viewer_id);
                query_builder.push(")");
                count_builder.push(" AND business_id IN (SELECT id FROM businesses WHERE owner_id = ");
                count_builder.push_bind(viewer_id);
                count_builder.push(")");
            }
            UserRole::Admin => {}
        }

        if let Some(business_id) = query.business_id {
            query_builder.push(" AND business_id = ");
            query_builder.push_bind(business_id);
            count_builder.push(" AND business_id = ");
            count_builder.push_bind(business_id);
        }

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(params.limit());
        query_builder.push(" OFFSET ");
        query_builder.push_bind(params.offset());

        let orders = query_builder
            .build_query_as::<Order>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse::new(orders, total, &params))
    }

    /// Apply a status transition with role guards.
    ///
    /// The business owner or an admin may perform any legal transition; the
    /// customer of record may only cancel, and only while the order is still
    /// pending.
    pub async fn update_status(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
        new_status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let order = self.get_order(id).await?;
        let business_owner = self.business_owner(order.business_id).await?;

        let manages = actor_role == UserRole::Admin || business_owner == actor_id;
        let is_customer = order.customer_id == actor_id;

        if !manages {
            if !is_customer {
                return Err(ApiError::Forbidden(
                    "You are not a party to this order".to_string(),
                ));
            }
            if new_status != OrderStatus::Cancelled {
                return Err(ApiError::Forbidden(
                    "Customers may only cancel their orders".to_string(),
                ));
            }
            if order.status != OrderStatus::Pending {
                return Err(ApiError::UnprocessableEntity(format!(
                    "Only pending orders can be cancelled by the customer (order is '{}')",
                    order.status.as_str()
                )));
            }
        }

        if order.status.is_terminal() {
            return Err(ApiError::UnprocessableEntity(format!(
                "Order is already in terminal state '{}'",
                order.status.as_str()
            )));
        }

        if !order.status.can_transition_to(new_status) {
            return Err(ApiError::UnprocessableEntity(format!(
                "Cannot transition order from '{}' to '{}'",
                order.status.as_str(),
                new_status.as_str()
            )));
        }

        // Guard against a concurrent transition racing this one
        let updated = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(new_status)
        .bind(id)
        .bind(order.status)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(ApiError::Conflict(
            "Order status changed concurrently; retry".to_string(),
        ))?;

        tracing::info!(
            order_id = %id,
            from = %order.status.as_str(),
            to = %new_status.as_str(),
            actor_id = %actor_id,
            "Order status updated"
        );

        Ok(updated)
    }

    /// Cancel pending orders older than the TTL that have no payment in
    /// flight or succeeded. Returns what was cancelled.
    pub async fn expire_stale_pending(
        &self,
        ttl_minutes: i64,
    ) -> Result<Vec<(Uuid, String)>, ApiError> {
        let cutoff = Utc::now() - Duration::minutes(ttl_minutes);

        let cancelled: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending'
              AND created_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM payments p
                  WHERE p.order_id = orders.id
                    AND p.status IN ('processing', 'succeeded')
              )
            RETURNING id, reference
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cancelled)
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>, ApiError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(items)
    }

    async fn business_owner(&self, business_id: Uuid) -> Result<Uuid, ApiError> {
        sqlx::query_scalar("SELECT owner_id FROM businesses WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Business not found".to_string()))
    }

    async fn authorize_view(
        &self,
        order: &Order,
        viewer_id: Uuid,
        viewer_role: UserRole,
    ) -> Result<(), ApiError> {
        if viewer_role == UserRole::Admin || order.customer_id == viewer_id {
            return Ok(());
        }

        let owner = self.business_owner(order.business_id).await?;
        if owner == viewer_id {
            return Ok(());
        }

        Err(ApiError::Forbidden(
            "You are not a party to this order".to_string(),
        ))
    }
}

/// Generate a human-readable order reference (`ORD-` + 8 chars)
fn generate_reference() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect();
    format!("ORD-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        assert!(reference.starts_with("ORD-"));
        assert_eq!(reference.len(), 12);
        // Ambiguous characters (0, O, 1, I) are excluded from the alphabet
        let suffix = &reference[4..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(!suffix.contains(&['0', 'O', '1', 'I'][..]));
    }

    #[test]
    fn test_references_vary() {
        let a = generate_reference();
        let b = generate_reference();
        // 32^8 possibilities; two draws colliding means the RNG is broken
        assert_ne!(a, b);
    }
}
