//! Order route definitions

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
}
