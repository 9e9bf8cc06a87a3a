//! Product HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{AuthenticatedUser, OptionalUser};
use crate::error::ApiError;
use crate::models::PaginatedResponse;
use crate::product::{
    CreateProductRequest, ListProductsQuery, Product, UpdateProductRequest,
};
use crate::state::AppState;

/// POST /businesses/:business_id/products - Add a product to the menu
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(business_id): Path<Uuid>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    req.validate()?;

    let product = state
        .product_service
        .create_product(business_id, user.user_id, user.role, req)
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /businesses/:business_id/products - List a business's menu
///
/// Public callers only see available products of an active business. The
/// owner and admins can opt into unavailable rows with `include_unavailable`.
pub async fn list_products(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(business_id): Path<Uuid>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<PaginatedResponse<Product>>, ApiError> {
    let business = state.product_service.business_for(business_id).await?;

    let manages = viewer
        .0
        .as_ref()
        .map(|u| business.is_managed_by(u.user_id, u.role))
        .unwrap_or(false);

    if !business.is_active && !manages {
        return Err(ApiError::NotFound("Business not found".to_string()));
    }

    let include_unavailable = manages && query.include_unavailable.unwrap_or(false);

    let result = state
        .product_service
        .list_products(business_id, query, include_unavailable)
        .await?;

    Ok(Json(result))
}

/// GET /products/:id - Fetch one product
pub async fn get_product(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = state.product_service.get_product(id).await?;
    let business = state
        .product_service
        .business_for(product.business_id)
        .await?;

    let manages = viewer
        .0
        .as_ref()
        .map(|u| business.is_managed_by(u.user_id, u.role))
        .unwrap_or(false);

    // Unavailable rows and rows under a deactivated business look like 404
    // to everyone who does not manage the business.
    if (!business.is_active || !product.is_available) && !manages {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    Ok(Json(product))
}

/// PUT /products/:id - Partially update a product (owner/admin)
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    req.validate()?;

    let product = state
        .product_service
        .update_product(id, user.user_id, user.role, req)
        .await?;

    Ok(Json(product))
}

/// DELETE /products/:id - Remove a product (owner/admin)
///
/// Hard delete. Existing orders are unaffected because items snapshot the
/// product name and unit price at order time.
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .product_service
        .delete_product(id, user.user_id, user.role)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
