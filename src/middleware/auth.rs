//! Authentication middleware
//!
//! Middleware for JWT token verification and user extraction.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{verify_token, AuthService, JwtError};
use crate::models::UserRole;

/// Authenticated user extracted from JWT token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthErrorBody {
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

struct AuthRejection {
    status: StatusCode,
    body: AuthErrorBody,
}

impl AuthRejection {
    fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            body: AuthErrorBody {
                error: AuthErrorDetails {
                    code: code.to_string(),
                    message: message.to_string(),
                },
            },
        }
    }

    fn unauthorized(code: &str, message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Extractor for authenticated users
///
/// Verifies the bearer token from the Authorization header, checks it is an
/// access token, and confirms the backing session has not been revoked.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthRejection::unauthorized(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = verify_token(bearer.token(), auth_service.jwt_secret()).map_err(|e| {
            let (code, message) = match e {
                JwtError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired"),
                _ => ("INVALID_TOKEN", "Invalid token"),
            };
            AuthRejection::unauthorized(code, message).into_response()
        })?;

        // Refresh tokens never grant API access
        if claims.token_type != "access" {
            return Err(
                AuthRejection::unauthorized("INVALID_TOKEN_TYPE", "Expected access token")
                    .into_response(),
            );
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            AuthRejection::unauthorized("INVALID_TOKEN", "Invalid user ID in token").into_response()
        })?;

        let role = UserRole::parse(&claims.role).ok_or_else(|| {
            AuthRejection::unauthorized("INVALID_TOKEN", "Invalid role in token").into_response()
        })?;

        // Logout and account deactivation take effect immediately
        auth_service.verify_session(&claims.jti).await.map_err(|_| {
            AuthRejection::unauthorized("SESSION_REVOKED", "Session has been revoked")
                .into_response()
        })?;

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
            role,
            jti: claims.jti,
        })
    }
}

/// Optional authenticated user extractor
///
/// Attempts to authenticate but doesn't fail if no token is present. Public
/// listing endpoints use this to widen results for owners and admins.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}

