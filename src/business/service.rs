use sqlx::PgPool;
use uuid::Uuid;

use crate::business::model::{
    Business, CreateBusinessRequest, ListBusinessesQuery, UpdateBusinessRequest,
};
use crate::error::ApiError;
use crate::models::{PaginatedResponse, PaginationParams, UserRole};

#[derive(Clone)]
pub struct BusinessService {
    db_pool: PgPool,
}

impl BusinessService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create a business. Customers cannot own businesses; only admins may
    /// create one on behalf of another user.
    pub async fn create_business(
        &self,
        actor_id: Uuid,
        actor_role: UserRole,
        request: CreateBusinessRequest,
    ) -> Result<Business, ApiError> {
        if actor_role == UserRole::Customer {
            return Err(ApiError::Forbidden(
                "Only owners and admins can create businesses".to_string(),
            ));
        }

        let owner_id = match request.owner_id {
            Some(other) if other != actor_id => {
                if actor_role != UserRole::Admin {
                    return Err(ApiError::Forbidden(
                        "Only admins can create a business for another owner".to_string(),
                    ));
                }
                other
            }
            _ => actor_id,
        };

        let name = request.name.trim();
        if name.is_empty() {
            return Err(ApiError::ValidationError(
                "Business name must not be blank".to_string(),
            ));
        }

        let currency = normalize_currency(request.currency.as_deref())?;

        let business = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                id, owner_id, name, description, address, phone, currency,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(&request.description)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&currency)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(business_id = %business.id, owner_id = %owner_id, "Business created");

        Ok(business)
    }

    pub async fn get_business(&self, id: Uuid) -> Result<Business, ApiError> {
        sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Business not found".to_string()))
    }

    /// List businesses. Inactive rows are only included when the caller has
    /// been cleared to see them (admins, or owners filtering by themselves).
    pub async fn list_businesses(
        &self,
        query: ListBusinessesQuery,
        include_inactive: bool,
    ) -> Result<PaginatedResponse<Business>, ApiError> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };

        let mut query_builder = sqlx::QueryBuilder::new("SELECT * FROM businesses WHERE 1=1");
        let mut count_builder =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM businesses WHERE 1=1");

        if !include_inactive {
            query_builder.push(" AND is_active = TRUE");
            count_builder.push(" AND is_active = TRUE");
        }

        if let Some(owner_id) = query.owner_id {
            query_builder.push(" AND owner_id = ");
            query_builder.push_bind(owner_id);
            count_builder.push(" AND owner_id = ");
            count_builder.push_bind(owner_id);
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(params.limit());
        query_builder.push(" OFFSET ");
        query_builder.push_bind(params.offset());

        let businesses = query_builder
            .build_query_as::<Business>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse::new(businesses, total, &params))
    }

    /// Partially update a business. Only the owner of record or an admin.
    pub async fn update_business(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
        request: UpdateBusinessRequest,
    ) -> Result<Business, ApiError> {
        if request.is_empty() {
            return Err(ApiError::BadRequest(
                "No fields provided to update".to_string(),
            ));
        }

        let business = self.get_business(id).await?;
        if !business.is_managed_by(actor_id, actor_role) {
            return Err(ApiError::Forbidden(
                "You do not manage this business".to_string(),
            ));
        }

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(ApiError::ValidationError(
                    "Business name must not be blank".to_string(),
                ))
            }
            other => other,
        };

        let currency = match request.currency.as_deref() {
            Some(code) => Some(normalize_currency(Some(code))?),
            None => None,
        };

        let updated = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                currency = COALESCE($5, currency),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&request.description)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&currency)
        .bind(request.is_active)
        .bind(id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(updated)
    }

    /// Soft-delete a business. Its products drop out of public listings with it.
    pub async fn deactivate_business(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
    ) -> Result<(), ApiError> {
        let business = self.get_business(id).await?;
        if !business.is_managed_by(actor_id, actor_role) {
            return Err(ApiError::Forbidden(
                "You do not manage this business".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE businesses SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(business_id = %id, actor_id = %actor_id, "Business deactivated");

        Ok(())
    }
}

/// Uppercase and sanity-check an ISO-4217 code, defaulting to EUR
fn normalize_currency(code: Option<&str>) -> Result<String, ApiError> {
    let code = code.unwrap_or("EUR").trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::ValidationError(format!(
            "'{}' is not a valid ISO-4217 currency code",
            code
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(None).unwrap(), "EUR");
        assert_eq!(normalize_currency(Some("usd")).unwrap(), "USD");
        assert_eq!(normalize_currency(Some(" gbp ")).unwrap(), "GBP");
        assert!(normalize_currency(Some("EU")).is_err());
        assert!(normalize_currency(Some("123")).is_err());
    }
}
