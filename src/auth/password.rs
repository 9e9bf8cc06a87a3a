//! Password hashing and verification
//!
//! Bcrypt with a configurable cost factor (see `Config::bcrypt_cost`).

use thiserror::Error;

/// Errors that can occur during password hashing or verification
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashFailed(String),

    #[error("Password verification failed: {0}")]
    VerifyFailed(String),
}

/// Hash a plaintext password with bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(password, cost).map_err(|e| PasswordError::HashFailed(e.to_string()))
}

/// Verify a plaintext password against a stored bcrypt hash
///
/// Returns `Ok(false)` for a well-formed hash that does not match;
/// `Err` only for malformed hashes.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(password, password_hash).map_err(|e| PasswordError::VerifyFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost keeps these tests fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery staple", TEST_COST).unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password", TEST_COST).unwrap();
        let b = hash_password("same password", TEST_COST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_errors() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
