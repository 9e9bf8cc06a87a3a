//! Authentication service
//!
//! Core business logic for email/password authentication and session
//! management.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AuthSession, AuthTokensResponse, LoginRequest, RegisterRequest, User, UserRole,
};

use super::jwt::{generate_access_token, generate_refresh_token, verify_token, JwtError};
use super::password::{hash_password, verify_password, PasswordError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("User not found")]
    UserNotFound,

    #[error("Session not found or revoked")]
    SessionNotFound,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Password error: {0}")]
    PasswordError(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenError(e.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::PasswordError(e.to_string())
    }
}

impl From<AuthError> for crate::error::ApiError {
    fn from(e: AuthError) -> Self {
        use crate::error::ApiError;
        match e {
            AuthError::EmailTaken => ApiError::Conflict(e.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(e.to_string()),
            AuthError::AccountDisabled => ApiError::Forbidden(e.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(e.to_string()),
            AuthError::SessionNotFound
            | AuthError::InvalidRefreshToken
            | AuthError::TokenError(_) => ApiError::Unauthorized(e.to_string()),
            AuthError::DatabaseError(msg) => ApiError::DatabaseError(msg),
            AuthError::PasswordError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db_pool: PgPool,
    jwt_secret: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_days: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        db_pool: PgPool,
        jwt_secret: String,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_days: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db_pool,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_days,
            bcrypt_cost,
        }
    }

    /// Register a new user and issue an initial token pair
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthTokensResponse, AuthError> {
        let email = normalize_email(&req.email);
        let role: UserRole = req.role.map(Into::into).unwrap_or(UserRole::Customer);
        let password_hash = hash_password(&req.password, self.bcrypt_cost)?;

        // The unique index on email is the source of truth; ON CONFLICT keeps
        // concurrent registrations race-free.
        let user: Option<User> = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW())
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, full_name, role, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .bind(req.full_name.trim())
        .bind(role)
        .fetch_optional(&self.db_pool)
        .await?;

        let user = user.ok_or(AuthError::EmailTaken)?;

        tracing::info!(user_id = %user.id, role = %user.role.as_str(), "User registered");

        self.issue_tokens(&user).await
    }

    /// Verify credentials and issue a token pair
    pub async fn login(&self, req: LoginRequest) -> Result<AuthTokensResponse, AuthError> {
        let email = normalize_email(&req.email);

        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, full_name, role, is_active, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.db_pool)
        .await?;

        // Unknown email and wrong password produce the same error, so the
        // endpoint cannot be used to enumerate accounts.
        let user = user.ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.issue_tokens(&user).await
    }

    /// Issue an access/refresh token pair plus the backing session row
    async fn issue_tokens(&self, user: &User) -> Result<AuthTokensResponse, AuthError> {
        let jti = Uuid::new_v4().to_string();
        let access_token =
            generate_access_token(user, &jti, &self.jwt_secret, self.access_token_ttl_seconds)?;

        let refresh_jti = Uuid::new_v4().to_string();
        let refresh_token = generate_refresh_token(
            user,
            &refresh_jti,
            &self.jwt_secret,
            self.refresh_token_ttl_days,
        )?;

        // Only a hash of the refresh token is stored
        let refresh_token_hash = hash_token(&refresh_token);
        let session_expires_at = Utc::now() + Duration::days(self.refresh_token_ttl_days);

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (id, user_id, jti, refresh_token_hash, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(&jti)
        .bind(&refresh_token_hash)
        .bind(session_expires_at)
        .execute(&self.db_pool)
        .await?;

        Ok(AuthTokensResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: user.clone().into(),
        })
    }

    /// Refresh tokens using a valid refresh token
    ///
    /// Rotates the jti and the stored refresh-token hash on the same session
    /// row; the previous refresh token stops working immediately.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<AuthTokensResponse, AuthError> {
        let claims = verify_token(refresh_token, &self.jwt_secret)?;

        if claims.token_type != "refresh" {
            return Err(AuthError::InvalidRefreshToken);
        }

        let refresh_token_hash = hash_token(refresh_token);

        let session: AuthSession = sqlx::query_as(
            r#"
            SELECT id, user_id, jti, refresh_token_hash, expires_at, revoked, revoked_at, created_at, updated_at
            FROM auth_sessions
            WHERE refresh_token_hash = $1 AND revoked = FALSE AND expires_at > NOW()
            "#,
        )
        .bind(&refresh_token_hash)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        let user = self.get_user_by_id(session.user_id).await?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let jti = Uuid::new_v4().to_string();
        let access_token =
            generate_access_token(&user, &jti, &self.jwt_secret, self.access_token_ttl_seconds)?;

        let refresh_jti = Uuid::new_v4().to_string();
        let new_refresh_token = generate_refresh_token(
            &user,
            &refresh_jti,
            &self.jwt_secret,
            self.refresh_token_ttl_days,
        )?;

        let new_refresh_token_hash = hash_token(&new_refresh_token);
        let session_expires_at = Utc::now() + Duration::days(self.refresh_token_ttl_days);

        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET jti = $1, refresh_token_hash = $2, expires_at = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&jti)
        .bind(&new_refresh_token_hash)
        .bind(session_expires_at)
        .bind(session.id)
        .execute(&self.db_pool)
        .await?;

        Ok(AuthTokensResponse {
            access_token,
            refresh_token: new_refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: user.into(),
        })
    }

    /// Revoke a session (logout)
    pub async fn revoke_session(&self, jti: &str) -> Result<(), AuthError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = NOW(), updated_at = NOW()
            WHERE jti = $1 AND revoked = FALSE
            "#,
        )
        .bind(jti)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AuthError::SessionNotFound);
        }

        Ok(())
    }

    /// Revoke all sessions for a user
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, AuthError> {
        sqlx::query_as(
            r#"
            SELECT id, email, password_hash, full_name, role, is_active, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AuthError::UserNotFound)
    }

    /// Verify a session is valid (not revoked, account still active)
    pub async fn verify_session(&self, jti: &str) -> Result<AuthSession, AuthError> {
        sqlx::query_as(
            r#"
            SELECT s.id, s.user_id, s.jti, s.refresh_token_hash, s.expires_at, s.revoked, s.revoked_at, s.created_at, s.updated_at
            FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.jti = $1 AND s.revoked = FALSE AND s.expires_at > NOW() AND u.is_active = TRUE
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AuthError::SessionNotFound)
    }

    /// Get JWT secret (for middleware access)
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

/// Lowercase and trim an email for storage and lookup
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Cafetero.TEST "), "ana@cafetero.test");
        assert_eq!(normalize_email("plain@example.com"), "plain@example.com");
    }

    #[test]
    fn test_hash_token_is_stable_and_hex() {
        let a = hash_token("some-refresh-token");
        let b = hash_token("some-refresh-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let c = hash_token("another-token");
        assert_ne!(a, c);
    }
}
