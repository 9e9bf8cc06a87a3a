use sqlx::PgPool;
use uuid::Uuid;

use crate::business::Business;
use crate::error::ApiError;
use crate::models::{PaginatedResponse, PaginationParams, UserRole};
use crate::product::model::{
    CreateProductRequest, ListProductsQuery, Product, UpdateProductRequest,
};

#[derive(Clone)]
pub struct ProductService {
    db_pool: PgPool,
}

impl ProductService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Add a product to a business's catalog. Only the business owner or an
    /// admin; product names are unique within a business.
    pub async fn create_product(
        &self,
        business_id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
        request: CreateProductRequest,
    ) -> Result<Product, ApiError> {
        let business = self.business_for(business_id).await?;
        if !business.is_managed_by(actor_id, actor_role) {
            return Err(ApiError::Forbidden(
                "You do not manage this business".to_string(),
            ));
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(ApiError::ValidationError(
                "Product name must not be blank".to_string(),
            ));
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, business_id, name, description, category, price_cents,
                is_available, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(name)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.price_cents)
        .bind(request.is_available.unwrap_or(true))
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| duplicate_name_error(e, name))?;

        tracing::info!(
            product_id = %product.id,
            business_id = %business_id,
            "Product created"
        );

        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, ApiError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Product not found".to_string()))
    }

    /// List a business's catalog. Unavailable products are only included when
    /// the caller manages the business.
    pub async fn list_products(
        &self,
        business_id: Uuid,
        query: ListProductsQuery,
        include_unavailable: bool,
    ) -> Result<PaginatedResponse<Product>, ApiError> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };

        let mut query_builder =
            sqlx::QueryBuilder::new("SELECT * FROM products WHERE business_id = ");
        query_builder.push_bind(business_id);
        let mut count_builder =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM products WHERE business_id = ");
        count_builder.push_bind(business_id);

        if !include_unavailable {
            query_builder.push(" AND is_available = TRUE");
            count_builder.push(" AND is_available = TRUE");
        }

        if let Some(category) = &query.category {
            query_builder.push(" AND category = ");
            query_builder.push_bind(category);
            count_builder.push(" AND category = ");
            count_builder.push_bind(category);
        }

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY name ASC LIMIT ");
        query_builder.push_bind(params.limit());
        query_builder.push(" OFFSET ");
        query_builder.push_bind(params.offset());

        let products = query_builder
            .build_query_as::<Product>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse::new(products, total, &params))
    }

    /// Partially update a product. Only the business owner or an admin.
    pub async fn update_product(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
        request: UpdateProductRequest,
    ) -> Result<Product, ApiError> {
        if request.is_empty() {
            return Err(ApiError::BadRequest(
                "No fields provided to update".to_string(),
            ));
        }

        let product = self.get_product(id).await?;
        let business = self.business_for(product.business_id).await?;
        if !business.is_managed_by(actor_id, actor_role) {
            return Err(ApiError::Forbidden(
                "You do not manage this business".to_string(),
            ));
        }

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(ApiError::ValidationError(
                    "Product name must not be blank".to_string(),
                ))
            }
            other => other,
        };

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                category = COALESCE($3, category),
                price_cents = COALESCE($4, price_cents),
                is_available = COALESCE($5, is_available),
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.price_cents)
        .bind(request.is_available)
        .bind(id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| duplicate_name_error(e, name.unwrap_or(&product.name)))?;

        Ok(updated)
    }

    /// Remove a product. Existing orders keep their name/price snapshots, so
    /// the row can go away outright.
    pub async fn delete_product(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
    ) -> Result<(), ApiError> {
        let product = self.get_product(id).await?;
        let business = self.business_for(product.business_id).await?;
        if !business.is_managed_by(actor_id, actor_role) {
            return Err(ApiError::Forbidden(
                "You do not manage this business".to_string(),
            ));
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(product_id = %id, actor_id = %actor_id, "Product deleted");

        Ok(())
    }

    /// Owning business for a product operation
    pub async fn business_for(&self, business_id: Uuid) -> Result<Business, ApiError> {
        sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ApiError::NotFound("Business not found".to_string()))
    }
}

/// Refine unique-index violations on (business_id, name) into a useful 409
fn duplicate_name_error(err: sqlx::Error, name: &str) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => ApiError::Conflict(
            format!("A product named '{}' already exists for this business", name),
        ),
        _ => err.into(),
    }
}
