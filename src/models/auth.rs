//! Authentication models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::UserRole;

/// Authentication session for JWT tracking
///
/// One row per login; the refresh token is stored as a SHA-256 hash and
/// rotated in place on refresh.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jti: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Roles a user may pick at registration. `admin` is intentionally absent.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterRole {
    Customer,
    Owner,
}

impl From<RegisterRole> for UserRole {
    fn from(role: RegisterRole) -> Self {
        match role {
            RegisterRole::Customer => UserRole::Customer,
            RegisterRole::Owner => UserRole::Owner,
        }
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub full_name: String,

    /// Defaults to `customer` when omitted
    pub role: Option<RegisterRole>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Auth tokens response
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// User response (sanitized for API)
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            email: "ana@cafetero.test".to_string(),
            password: "hunter2hunter2".to_string(),
            full_name: "Ana García".to_string(),
            role: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..ok_clone(&ok)
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "short".to_string(),
            ..ok_clone(&ok)
        };
        assert!(short_password.validate().is_err());

        let empty_name = RegisterRequest {
            full_name: String::new(),
            ..ok_clone(&ok)
        };
        assert!(empty_name.validate().is_err());
    }

    fn ok_clone(req: &RegisterRequest) -> RegisterRequest {
        RegisterRequest {
            email: req.email.clone(),
            password: req.password.clone(),
            full_name: req.full_name.clone(),
            role: None,
        }
    }

    #[test]
    fn test_register_role_never_maps_to_admin() {
        assert!(matches!(
            UserRole::from(RegisterRole::Customer),
            UserRole::Customer
        ));
        assert!(matches!(UserRole::from(RegisterRole::Owner), UserRole::Owner));
    }
}
