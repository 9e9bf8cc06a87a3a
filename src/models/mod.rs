//! Shared data models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// User model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// User roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Owner,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Owner => "owner",
            UserRole::Admin => "admin",
        }
    }

    /// Parse a role from its wire form (JWT claims)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "owner" => Some(UserRole::Owner),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

impl PaginationParams {
    /// Page number, 1-based
    pub fn page(&self) -> i64 {
        i64::from(self.page.unwrap_or(1).max(1))
    }

    /// Page size, clamped to 1..=100
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(20).clamp(1, 100))
    }

    /// Row offset for the current page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, params: &PaginationParams) -> Self {
        Self {
            data,
            total,
            page: params.page(),
            limit: params.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 20);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_pagination_is_clamped() {
        let params = PaginationParams {
            page: Some(0),
            limit: Some(5000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);

        let params = PaginationParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Customer, UserRole::Owner, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("superuser"), None);
    }
}
