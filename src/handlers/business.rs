//! Business HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{AuthenticatedUser, OptionalUser};
use crate::business::{
    Business, CreateBusinessRequest, ListBusinessesQuery, UpdateBusinessRequest,
};
use crate::error::ApiError;
use crate::models::PaginatedResponse;
use crate::state::AppState;

/// POST /businesses - Create a business (owner/admin)
pub async fn create_business(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<Business>), ApiError> {
    req.validate()?;

    let business = state
        .business_service
        .create_business(user.user_id, user.role, req)
        .await?;

    Ok((StatusCode::CREATED, Json(business)))
}

/// GET /businesses - Public listing of active businesses
///
/// Admins see inactive rows too; owners see their own inactive rows when
/// filtering by themselves.
pub async fn list_businesses(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Query(query): Query<ListBusinessesQuery>,
) -> Result<Json<PaginatedResponse<Business>>, ApiError> {
    let include_inactive = match &viewer.0 {
        Some(user) if user.is_admin() => true,
        Some(user) => query.owner_id == Some(user.user_id),
        None => false,
    };

    let result = state
        .business_service
        .list_businesses(query, include_inactive)
        .await?;

    Ok(Json(result))
}

/// GET /businesses/:id - Fetch one business
pub async fn get_business(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Business>, ApiError> {
    let business = state.business_service.get_business(id).await?;

    if !business.is_active {
        // Deactivated rows stay visible to their owner and admins only;
        // everyone else gets the same 404 as a missing row.
        let can_see = viewer
            .0
            .as_ref()
            .map(|u| business.is_managed_by(u.user_id, u.role))
            .unwrap_or(false);
        if !can_see {
            return Err(ApiError::NotFound("Business not found".to_string()));
        }
    }

    Ok(Json(business))
}

/// PUT /businesses/:id - Partially update a business (owner/admin)
pub async fn update_business(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBusinessRequest>,
) -> Result<Json<Business>, ApiError> {
    req.validate()?;

    let business = state
        .business_service
        .update_business(id, user.user_id, user.role, req)
        .await?;

    Ok(Json(business))
}

/// DELETE /businesses/:id - Soft-delete a business (owner/admin)
pub async fn delete_business(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .business_service
        .deactivate_business(id, user.user_id, user.role)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
