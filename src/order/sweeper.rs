//! Background job that cancels abandoned pending orders

use std::sync::Arc;
use std::time::Duration;

use super::OrderService;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background job for expiring stale pending orders.
///
/// Orders left `pending` past the TTL with no payment in flight are
/// cancelled so abandoned carts do not linger in business dashboards.
pub async fn pending_order_sweeper(order_service: Arc<OrderService>, ttl_minutes: i64) {
    tracing::info!(ttl_minutes, "Starting pending-order sweeper");

    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;

        match order_service.expire_stale_pending(ttl_minutes).await {
            Ok(cancelled) => {
                for (order_id, reference) in cancelled {
                    tracing::info!(%order_id, %reference, "Stale pending order cancelled");
                }
            }
            Err(e) => {
                tracing::error!("Error sweeping stale orders: {}", e);
            }
        }
    }
}
