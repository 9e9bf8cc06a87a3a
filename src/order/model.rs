//! Order models and the status state machine

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Order model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable reference (`ORD-XXXXXXXX`) shown on receipts
    pub reference: String,
    pub customer_id: Uuid,
    pub business_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle states
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,   // Placed, awaiting payment/acceptance
    Confirmed, // Accepted by the business (or paid)
    Preparing, // Being made
    Ready,     // Ready for pickup
    Completed, // Handed over
    Cancelled, // By customer (pending only), business, or expiry sweeper
}

impl OrderStatus {
    /// The transition table. Everything not listed here is illegal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Preparing)
                | (Confirmed, Cancelled)
                | (Preparing, Ready)
                | (Ready, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Order line item with name/price snapshotted at order time
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Null once the product has been hard-deleted
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Line total in cents
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

/// Request DTO for placing an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub business_id: Uuid,

    /// Per-item quantity bounds are enforced by the order service
    #[validate(length(min = 1, max = 50, message = "must contain 1-50 items"))]
    pub items: Vec<OrderItemRequest>,

    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub note: Option<String>,
}

/// One requested line item; prices are never taken from the client
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
}

/// Request DTO for a status transition
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Query parameters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub business_id: Option<Uuid>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Order with its line items, as returned by detail endpoints
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 6] = [Pending, Confirmed, Preparing, Ready, Completed, Cancelled];

    #[test]
    fn test_legal_transitions() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Completed));
    }

    #[test]
    fn test_illegal_transitions() {
        // No skipping forward
        assert!(!Pending.can_transition_to(Preparing));
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Ready));
        assert!(!Confirmed.can_transition_to(Completed));
        assert!(!Preparing.can_transition_to(Completed));

        // No moving backward
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Preparing.can_transition_to(Confirmed));
        assert!(!Ready.can_transition_to(Preparing));

        // Late cancellation is not allowed
        assert!(!Preparing.can_transition_to(Cancelled));
        assert!(!Ready.can_transition_to(Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [Completed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} -> {:?} should be illegal",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_self_transitions_are_illegal() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_item_total() {
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Some(Uuid::new_v4()),
            product_name: "Cortado".to_string(),
            unit_price_cents: 180,
            quantity: 3,
            created_at: Utc::now(),
        };
        assert_eq!(item.total_cents(), 540);
    }

    #[test]
    fn test_create_request_item_bounds() {
        let no_items = CreateOrderRequest {
            business_id: Uuid::new_v4(),
            items: vec![],
            note: None,
        };
        assert!(no_items.validate().is_err());

        let zero_quantity = OrderItemRequest {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(zero_quantity.validate().is_err());

        let too_many = CreateOrderRequest {
            business_id: Uuid::new_v4(),
            items: (0..51)
                .map(|_| OrderItemRequest {
                    product_id: Uuid::new_v4(),
                    quantity: 1,
                })
                .collect(),
            note: None,
        };
        assert!(too_many.validate().is_err());

        let ok = CreateOrderRequest {
            business_id: Uuid::new_v4(),
            items: vec![OrderItemRequest {
                product_id: Uuid::new_v4(),
                quantity: 2,
            }],
            note: Some("sin azúcar".to_string()),
        };
        assert!(ok.validate().is_ok());
    }
}
