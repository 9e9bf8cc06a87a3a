//! Payment route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/:id", get(get_payment))
        // HMAC-verified in the handler; must stay outside bearer auth
        .route("/payments/webhook", post(payment_webhook))
}
