//! Business route definitions

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn business_routes() -> Router<AppState> {
    Router::new()
        .route("/businesses", post(create_business))
        .route("/businesses", get(list_businesses))
        .route("/businesses/:id", get(get_business))
        .route("/businesses/:id", put(update_business))
        .route("/businesses/:id", delete(delete_business))
}
