//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthService;
use crate::business::BusinessService;
use crate::order::OrderService;
use crate::payment::PaymentService;
use crate::product::ProductService;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub business_service: Arc<BusinessService>,
    pub product_service: Arc<ProductService>,
    pub order_service: Arc<OrderService>,
    pub payment_service: Arc<PaymentService>,
    /// Pool handle for the health probe
    pub db_pool: PgPool,
    /// HMAC secret for gateway webhooks; None means the endpoint is
    /// fail-closed (503)
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        business_service: Arc<BusinessService>,
        product_service: Arc<ProductService>,
        order_service: Arc<OrderService>,
        payment_service: Arc<PaymentService>,
        db_pool: PgPool,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            auth_service,
            business_service,
            product_service,
            order_service,
            payment_service,
            db_pool,
            webhook_secret,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<BusinessService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.business_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProductService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.product_service.clone()
    }
}

impl FromRef<AppState> for Arc<OrderService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.order_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
