//! Cafetero Backend Server
//!
//! Main entry point for the Cafetero API: a multi-tenant backend for coffee
//! businesses covering user accounts, businesses and their menus, orders,
//! and gateway-backed payments.

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use cafetero_server::auth::AuthService;
use cafetero_server::business::BusinessService;
use cafetero_server::config::Config;
use cafetero_server::db;
use cafetero_server::handlers;
use cafetero_server::middleware::{self, RateLimiter};
use cafetero_server::order::{pending_order_sweeper, OrderService};
use cafetero_server::payment::{PaymentGateway, PaymentService};
use cafetero_server::product::ProductService;
use cafetero_server::routes;
use cafetero_server::state::AppState;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = %config.environment.as_str(), "Starting Cafetero API");

    // Connect and migrate
    let db_pool = match db::create_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::run_migrations(&db_pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Initialize services
    let auth_service = Arc::new(AuthService::new(
        db_pool.clone(),
        config.jwt_secret.clone(),
        config.jwt_access_token_ttl_seconds,
        config.jwt_refresh_token_ttl_days,
        config.bcrypt_cost,
    ));

    let business_service = Arc::new(BusinessService::new(db_pool.clone()));
    let product_service = Arc::new(ProductService::new(db_pool.clone()));
    let order_service = Arc::new(OrderService::new(db_pool.clone()));

    let gateway = PaymentGateway::new(
        config.payment_gateway_url.clone(),
        config.payment_gateway_api_key.clone(),
    );
    let payment_service = Arc::new(PaymentService::new(db_pool.clone(), gateway));

    // Create shared app state
    let app_state = AppState::new(
        auth_service,
        business_service,
        product_service,
        order_service.clone(),
        payment_service,
        db_pool.clone(),
        config.payment_webhook_secret.clone(),
    );

    // Start the pending-order sweeper in the background
    let sweeper_service = order_service.clone();
    let pending_ttl = config.order_pending_ttl_minutes;
    tokio::spawn(async move {
        tracing::info!(ttl_minutes = pending_ttl, "Pending order sweeper started");
        pending_order_sweeper(sweeper_service, pending_ttl).await;
        tracing::error!("Pending order sweeper exited unexpectedly");
    });

    // Initialize the per-client rate limiter and its cleanup task
    let rate_limiter = RateLimiter::new(config.rate_limit_rps);

    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(300)).await;
            cleanup_limiter.cleanup(Duration::from_secs(600)).await;
        }
    });

    // Create the app router
    let api = routes::auth_routes()
        .merge(routes::business_routes())
        .merge(routes::product_routes())
        .merge(routes::order_routes())
        .merge(routes::payment_routes());

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api)
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let limiter = rate_limiter.clone();
            async move { limiter.handle(req, next).await }
        }))
        .layer(configure_cors(&config));

    // HSTS only where TLS termination is guaranteed
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "Cafetero API Server"
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed = config.cors_allowed_origins.as_deref().unwrap_or("");

    if allowed.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
