//! Business models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::UserRole;

/// Business model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    /// Whether a user may manage (update, deactivate, stock) this business
    pub fn is_managed_by(&self, user_id: Uuid, role: UserRole) -> bool {
        role == UserRole::Admin || self.owner_id == user_id
    }
}

/// Request DTO for creating a business
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 300, message = "must be at most 300 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,

    /// ISO-4217 code; defaults to EUR
    #[validate(custom = "validate_currency")]
    pub currency: Option<String>,

    /// Only admins may create a business on behalf of another owner
    pub owner_id: Option<Uuid>,
}

/// Request DTO for partially updating a business
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 300, message = "must be at most 300 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,

    #[validate(custom = "validate_currency")]
    pub currency: Option<String>,

    pub is_active: Option<bool>,
}

impl UpdateBusinessRequest {
    /// True when no field is set; such a request is a no-op and rejected
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.currency.is_none()
            && self.is_active.is_none()
    }
}

/// Query parameters for listing businesses
#[derive(Debug, Default, Deserialize)]
pub struct ListBusinessesQuery {
    pub owner_id: Option<Uuid>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Validate an ISO-4217 currency code (three ASCII letters)
pub fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("currency"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_codes() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("usd").is_ok());
        assert!(validate_currency("EU").is_err());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1R").is_err());
    }

    #[test]
    fn test_is_managed_by() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let business = Business {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: "La Taza".to_string(),
            description: None,
            address: None,
            phone: None,
            currency: "EUR".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(business.is_managed_by(owner, UserRole::Owner));
        assert!(!business.is_managed_by(stranger, UserRole::Owner));
        assert!(!business.is_managed_by(stranger, UserRole::Customer));
        assert!(business.is_managed_by(stranger, UserRole::Admin));
    }

    #[test]
    fn test_update_request_is_empty() {
        let empty = UpdateBusinessRequest {
            name: None,
            description: None,
            address: None,
            phone: None,
            currency: None,
            is_active: None,
        };
        assert!(empty.is_empty());

        let named = UpdateBusinessRequest {
            name: Some("La Taza".to_string()),
            ..empty
        };
        assert!(!named.is_empty());
    }
}
