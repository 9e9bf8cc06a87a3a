//! Product catalog models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Product model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 60, message = "must be at most 60 characters"))]
    pub category: Option<String>,

    /// Price in minor units (cents); fractional euros never cross the API
    #[validate(range(min = 1, message = "must be at least 1 cent"))]
    pub price_cents: i64,

    /// Defaults to available
    pub is_available: Option<bool>,
}

/// Request DTO for partially updating a product
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 60, message = "must be at most 60 characters"))]
    pub category: Option<String>,

    #[validate(range(min = 1, message = "must be at least 1 cent"))]
    pub price_cents: Option<i64>,

    pub is_available: Option<bool>,
}

impl UpdateProductRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price_cents.is_none()
            && self.is_available.is_none()
    }
}

/// Query parameters for listing a business's products
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    /// Honored only for the owning user or an admin
    pub include_unavailable: Option<bool>,
    pub category: Option<String>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let ok = CreateProductRequest {
            name: "Cortado".to_string(),
            description: None,
            category: Some("coffee".to_string()),
            price_cents: 180,
            is_available: None,
        };
        assert!(ok.validate().is_ok());

        let free = CreateProductRequest {
            price_cents: 0,
            name: "Cortado".to_string(),
            description: None,
            category: None,
            is_available: None,
        };
        assert!(free.validate().is_err());

        let negative = CreateProductRequest {
            price_cents: -250,
            name: "Cortado".to_string(),
            description: None,
            category: None,
            is_available: None,
        };
        assert!(negative.validate().is_err());

        let nameless = CreateProductRequest {
            name: String::new(),
            description: None,
            category: None,
            price_cents: 180,
            is_available: None,
        };
        assert!(nameless.validate().is_err());
    }
}
