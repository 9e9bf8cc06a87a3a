//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::PaginatedResponse;
use crate::order::{
    CreateOrderRequest, ListOrdersQuery, Order, OrderResponse, UpdateOrderStatusRequest,
};
use crate::state::AppState;

/// POST /orders - Place an order against a business
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    req.validate()?;

    let order = state.order_service.create_order(user.user_id, req).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders - List orders visible to the caller
///
/// Customers see their own orders, owners see orders of their businesses,
/// admins see everything.
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let result = state
        .order_service
        .list_orders(user.user_id, user.role, query)
        .await?;

    Ok(Json(result))
}

/// GET /orders/:id - Fetch one order with its items
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .order_service
        .get_order_for_viewer(id, user.user_id, user.role)
        .await?;

    Ok(Json(order))
}

/// PATCH /orders/:id/status - Move an order through its lifecycle
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .order_service
        .update_status(id, user.user_id, user.role, req.status)
        .await?;

    Ok(Json(order))
}
