//! End-to-end flows against a real database
//!
//! Covers registration/login/refresh, the order lifecycle with its role
//! guards, webhook-driven payment updates, and the pending-order sweeper.

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use cafetero_server::auth::{AuthError, AuthService};
    use cafetero_server::business::{Business, BusinessService, CreateBusinessRequest};
    use cafetero_server::error::ApiError;
    use cafetero_server::models::{LoginRequest, RegisterRequest, RegisterRole, UserResponse, UserRole};
    use cafetero_server::order::{
        CreateOrderRequest, OrderItemRequest, OrderService, OrderStatus,
    };
    use cafetero_server::payment::{
        PaymentGateway, PaymentService, PaymentStatus, WebhookEvent, WebhookEventData,
        WebhookOutcome,
    };
    use cafetero_server::product::{CreateProductRequest, Product, ProductService};

    const TEST_PASSWORD: &str = "espresso-machine-9000";
    const TEST_SECRET: &str = "integration-test-signing-secret";

    /// Helper to create a test database pool (migrations are idempotent)
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/cafetero_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        cafetero_server::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn auth_service(pool: &PgPool) -> AuthService {
        // Low bcrypt cost keeps the suite fast
        AuthService::new(pool.clone(), TEST_SECRET.to_string(), 900, 7, 4)
    }

    fn payment_service(pool: &PgPool) -> PaymentService {
        // The gateway is never reached by webhook processing
        let gateway = PaymentGateway::new("http://127.0.0.1:1".to_string(), "gw_test".to_string());
        PaymentService::new(pool.clone(), gateway)
    }

    async fn register_user(pool: &PgPool, role: Option<RegisterRole>) -> UserResponse {
        auth_service(pool)
            .register(RegisterRequest {
                email: format!("user-{}@cafetero.test", Uuid::new_v4()),
                password: TEST_PASSWORD.to_string(),
                full_name: "Integration Tester".to_string(),
                role,
            })
            .await
            .expect("Failed to register user")
            .user
    }

    async fn seed_business(pool: &PgPool, owner_id: Uuid) -> Business {
        BusinessService::new(pool.clone())
            .create_business(
                owner_id,
                UserRole::Owner,
                CreateBusinessRequest {
                    name: format!("Cafe {}", Uuid::new_v4().simple()),
                    description: None,
                    address: None,
                    phone: None,
                    currency: None,
                    owner_id: None,
                },
            )
            .await
            .expect("Failed to create business")
    }

    async fn seed_product(
        pool: &PgPool,
        business_id: Uuid,
        owner_id: Uuid,
        name: &str,
        price_cents: i64,
    ) -> Product {
        ProductService::new(pool.clone())
            .create_product(
                business_id,
                owner_id,
                UserRole::Owner,
                CreateProductRequest {
                    name: name.to_string(),
                    description: None,
                    category: Some("coffee".to_string()),
                    price_cents,
                    is_available: None,
                },
            )
            .await
            .expect("Failed to create product")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_registration_login_and_refresh_flow() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);

        let email = format!("ana-{}@cafetero.test", Uuid::new_v4());
        let registered = auth
            .register(RegisterRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_string(),
                full_name: "Ana García".to_string(),
                role: None,
            })
            .await
            .expect("registration should succeed");

        assert_eq!(registered.user.email, email);
        assert!(matches!(registered.user.role, UserRole::Customer));

        let logged_in = auth
            .login(LoginRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("login should succeed");

        let refreshed = auth
            .refresh_tokens(&logged_in.refresh_token)
            .await
            .expect("refresh should succeed");

        assert_ne!(refreshed.refresh_token, logged_in.refresh_token);

        // Rotation invalidates the previous refresh token
        let replayed = auth.refresh_tokens(&logged_in.refresh_token).await;
        assert!(matches!(replayed, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_login_with_wrong_password_is_rejected() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);
        let user = register_user(&pool, None).await;

        let result = auth
            .login(LoginRequest {
                email: user.email,
                password: "definitely-not-it".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_duplicate_email_registration_is_rejected() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);

        let email = format!("dup-{}@cafetero.test", Uuid::new_v4());
        let request = || RegisterRequest {
            email: email.clone(),
            password: TEST_PASSWORD.to_string(),
            full_name: "First".to_string(),
            role: None,
        };

        auth.register(request()).await.expect("first registration");

        let second = auth.register(request()).await;
        assert!(matches!(second, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_order_lifecycle_happy_path() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let flat_white = seed_product(&pool, business.id, owner.id, "Flat White", 350).await;
        let croissant = seed_product(&pool, business.id, owner.id, "Croissant", 250).await;

        let placed = orders
            .create_order(
                customer.id,
                CreateOrderRequest {
                    business_id: business.id,
                    items: vec![
                        OrderItemRequest {
                            product_id: flat_white.id,
                            quantity: 2,
                        },
                        OrderItemRequest {
                            product_id: croissant.id,
                            quantity: 1,
                        },
                    ],
                    note: Some("oat milk please".to_string()),
                },
            )
            .await
            .expect("order creation should succeed");

        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.total_cents, 2 * 350 + 250);
        assert!(placed.order.reference.starts_with("ORD-"));
        assert_eq!(placed.items.len(), 2);

        // Items snapshot the catalog name and price
        let snapshot = placed
            .items
            .iter()
            .find(|i| i.product_id == Some(flat_white.id))
            .expect("flat white line item");
        assert_eq!(snapshot.product_name, "Flat White");
        assert_eq!(snapshot.unit_price_cents, 350);

        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
        ] {
            let updated = orders
                .update_status(placed.order.id, owner.id, UserRole::Owner, next)
                .await
                .expect("legal transition should succeed");
            assert_eq!(updated.status, next);
        }

        // Terminal states accept no further writes
        let after_terminal = orders
            .update_status(
                placed.order.id,
                owner.id,
                UserRole::Owner,
                OrderStatus::Cancelled,
            )
            .await;
        assert!(matches!(
            after_terminal,
            Err(ApiError::UnprocessableEntity(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_customer_cancel_rules() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = seed_product(&pool, business.id, owner.id, "Cortado", 300).await;

        let order_request = |product_id| CreateOrderRequest {
            business_id: business.id,
            items: vec![OrderItemRequest {
                product_id,
                quantity: 1,
            }],
            note: None,
        };

        // A customer may cancel their own pending order
        let first = orders
            .create_order(customer.id, order_request(product.id))
            .await
            .expect("first order");
        let cancelled = orders
            .update_status(
                first.order.id,
                customer.id,
                UserRole::Customer,
                OrderStatus::Cancelled,
            )
            .await
            .expect("customer cancel of pending order");
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // But not confirm it
        let second = orders
            .create_order(customer.id, order_request(product.id))
            .await
            .expect("second order");
        let confirm_attempt = orders
            .update_status(
                second.order.id,
                customer.id,
                UserRole::Customer,
                OrderStatus::Confirmed,
            )
            .await;
        assert!(matches!(confirm_attempt, Err(ApiError::Forbidden(_))));

        // And not cancel once the business has confirmed
        orders
            .update_status(
                second.order.id,
                owner.id,
                UserRole::Owner,
                OrderStatus::Confirmed,
            )
            .await
            .expect("owner confirm");
        let late_cancel = orders
            .update_status(
                second.order.id,
                customer.id,
                UserRole::Customer,
                OrderStatus::Cancelled,
            )
            .await;
        assert!(matches!(late_cancel, Err(ApiError::UnprocessableEntity(_))));

        // A stranger is not a party to the order at all
        let stranger = register_user(&pool, None).await;
        let stranger_cancel = orders
            .update_status(
                second.order.id,
                stranger.id,
                UserRole::Customer,
                OrderStatus::Cancelled,
            )
            .await;
        assert!(matches!(stranger_cancel, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_illegal_transition_is_rejected() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = seed_product(&pool, business.id, owner.id, "Americano", 280).await;

        let placed = orders
            .create_order(
                customer.id,
                CreateOrderRequest {
                    business_id: business.id,
                    items: vec![OrderItemRequest {
                        product_id: product.id,
                        quantity: 1,
                    }],
                    note: None,
                },
            )
            .await
            .expect("order");

        // pending -> ready skips confirmation and preparation
        let skipped = orders
            .update_status(placed.order.id, owner.id, UserRole::Owner, OrderStatus::Ready)
            .await;

        match skipped {
            Err(ApiError::UnprocessableEntity(msg)) => {
                assert!(msg.contains("pending"));
                assert!(msg.contains("ready"));
            }
            other => panic!("expected 422 for illegal transition, got {:?}", other.map(|o| o.status)),
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_order_rejects_unavailable_product() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());
        let products = ProductService::new(pool.clone());

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = products
            .create_product(
                business.id,
                owner.id,
                UserRole::Owner,
                CreateProductRequest {
                    name: "Seasonal Special".to_string(),
                    description: None,
                    category: None,
                    price_cents: 450,
                    is_available: Some(false),
                },
            )
            .await
            .expect("product");

        let result = orders
            .create_order(
                customer.id,
                CreateOrderRequest {
                    business_id: business.id,
                    items: vec![OrderItemRequest {
                        product_id: product.id,
                        quantity: 1,
                    }],
                    note: None,
                },
            )
            .await;

        assert!(matches!(result, Err(ApiError::UnprocessableEntity(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_webhook_success_is_idempotent() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());
        let payments = payment_service(&pool);

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = seed_product(&pool, business.id, owner.id, "Mocha", 420).await;

        let placed = orders
            .create_order(
                customer.id,
                CreateOrderRequest {
                    business_id: business.id,
                    items: vec![OrderItemRequest {
                        product_id: product.id,
                        quantity: 1,
                    }],
                    note: None,
                },
            )
            .await
            .expect("order");

        let provider_ref = format!("pi_{}", Uuid::new_v4().simple());
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, provider_ref, amount_cents, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'processing')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(placed.order.id)
        .bind(&provider_ref)
        .bind(placed.order.total_cents)
        .bind(&placed.order.currency)
        .execute(&pool)
        .await
        .expect("insert payment row");

        let event = WebhookEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            event_type: "payment_intent.succeeded".to_string(),
            data: WebhookEventData {
                provider_ref: provider_ref.clone(),
                failure_reason: None,
            },
        };
        let payload = serde_json::json!({ "id": event.id, "type": event.event_type });

        let first = payments
            .process_webhook_event(&event, payload.clone())
            .await
            .expect("first delivery");
        assert_eq!(first, WebhookOutcome::Processed);

        let second = payments
            .process_webhook_event(&event, payload)
            .await
            .expect("redelivery");
        assert_eq!(second, WebhookOutcome::Duplicate);

        let payment: cafetero_server::payment::Payment =
            sqlx::query_as("SELECT * FROM payments WHERE provider_ref = $1")
                .bind(&provider_ref)
                .fetch_one(&pool)
                .await
                .expect("payment row");
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert!(payment.paid_at.is_some());

        let order = orders.get_order(placed.order.id).await.expect("order row");
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_webhook_failure_never_downgrades_success() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());
        let payments = payment_service(&pool);

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = seed_product(&pool, business.id, owner.id, "Latte", 380).await;

        let placed = orders
            .create_order(
                customer.id,
                CreateOrderRequest {
                    business_id: business.id,
                    items: vec![OrderItemRequest {
                        product_id: product.id,
                        quantity: 1,
                    }],
                    note: None,
                },
            )
            .await
            .expect("order");

        let provider_ref = format!("pi_{}", Uuid::new_v4().simple());
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, provider_ref, amount_cents, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'processing')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(placed.order.id)
        .bind(&provider_ref)
        .bind(placed.order.total_cents)
        .bind(&placed.order.currency)
        .execute(&pool)
        .await
        .expect("insert payment row");

        let success = WebhookEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            event_type: "payment_intent.succeeded".to_string(),
            data: WebhookEventData {
                provider_ref: provider_ref.clone(),
                failure_reason: None,
            },
        };
        payments
            .process_webhook_event(&success, serde_json::json!({ "id": success.id }))
            .await
            .expect("success delivery");

        // Late, out-of-order failure event for the same intent
        let failure = WebhookEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            event_type: "payment_intent.payment_failed".to_string(),
            data: WebhookEventData {
                provider_ref: provider_ref.clone(),
                failure_reason: Some("card_declined".to_string()),
            },
        };
        let outcome = payments
            .process_webhook_event(&failure, serde_json::json!({ "id": failure.id }))
            .await
            .expect("failure delivery");
        assert_eq!(outcome, WebhookOutcome::Processed);

        let payment: cafetero_server::payment::Payment =
            sqlx::query_as("SELECT * FROM payments WHERE provider_ref = $1")
                .bind(&provider_ref)
                .fetch_one(&pool)
                .await
                .expect("payment row");
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert!(payment.failure_reason.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_webhook_unknown_ref_is_acknowledged() {
        let pool = setup_test_db().await;
        let payments = payment_service(&pool);

        let event = WebhookEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            event_type: "payment_intent.succeeded".to_string(),
            data: WebhookEventData {
                provider_ref: format!("pi_unknown_{}", Uuid::new_v4().simple()),
                failure_reason: None,
            },
        };

        let outcome = payments
            .process_webhook_event(&event, serde_json::json!({ "id": event.id }))
            .await
            .expect("unknown ref is not an error");
        assert_eq!(outcome, WebhookOutcome::UnknownRef);

        // The event id was still recorded, so a redelivery is a duplicate
        let redelivered = payments
            .process_webhook_event(&event, serde_json::json!({ "id": event.id }))
            .await
            .expect("redelivery");
        assert_eq!(redelivered, WebhookOutcome::Duplicate);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_sweeper_cancels_only_stale_unpaid_orders() {
        let pool = setup_test_db().await;
        let orders = OrderService::new(pool.clone());

        let owner = register_user(&pool, Some(RegisterRole::Owner)).await;
        let customer = register_user(&pool, None).await;
        let business = seed_business(&pool, owner.id).await;
        let product = seed_product(&pool, business.id, owner.id, "Espresso", 200).await;

        let order_request = |product_id| CreateOrderRequest {
            business_id: business.id,
            items: vec![OrderItemRequest {
                product_id,
                quantity: 1,
            }],
            note: None,
        };

        let stale = orders
            .create_order(customer.id, order_request(product.id))
            .await
            .expect("stale order");
        let fresh = orders
            .create_order(customer.id, order_request(product.id))
            .await
            .expect("fresh order");
        let paid = orders
            .create_order(customer.id, order_request(product.id))
            .await
            .expect("paid order");

        // Age the stale and paid orders past the TTL
        for id in [stale.order.id, paid.order.id] {
            sqlx::query("UPDATE orders SET created_at = NOW() - INTERVAL '90 minutes' WHERE id = $1")
                .bind(id)
                .execute(&pool)
                .await
                .expect("age order");
        }

        // The paid order has a succeeded payment, which exempts it
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, provider_ref, amount_cents, currency, status, paid_at)
            VALUES ($1, $2, $3, $4, $5, 'succeeded', NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(paid.order.id)
        .bind(format!("pi_{}", Uuid::new_v4().simple()))
        .bind(paid.order.total_cents)
        .bind(&paid.order.currency)
        .execute(&pool)
        .await
        .expect("insert succeeded payment");

        let cancelled = orders
            .expire_stale_pending(30)
            .await
            .expect("sweep should succeed");

        let cancelled_ids: Vec<Uuid> = cancelled.iter().map(|(id, _)| *id).collect();
        assert!(cancelled_ids.contains(&stale.order.id));
        assert!(!cancelled_ids.contains(&fresh.order.id));
        assert!(!cancelled_ids.contains(&paid.order.id));

        let stale_after = orders.get_order(stale.order.id).await.expect("stale row");
        assert_eq!(stale_after.status, OrderStatus::Cancelled);

        let fresh_after = orders.get_order(fresh.order.id).await.expect("fresh row");
        assert_eq!(fresh_after.status, OrderStatus::Pending);
    }
}
