//! Password hashing and verification
//!
//! One-way, salted bcrypt hashing. Verification of a malformed stored hash is
//! a failed match, never a crash.

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const BCRYPT_COST: u32 = 12;

/// Password hashing errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

/// Hashes and verifies user passwords
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: BCRYPT_COST }
    }
}

impl PasswordHasher {
    /// Create a hasher with an explicit bcrypt cost
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        bcrypt::hash(password, self.cost).map_err(|e| PasswordError::HashingError(e.to_string()))
    }

    /// Check a password against a stored bcrypt hash
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        match bcrypt::verify(password, password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Stored password hash could not be parsed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_cost(4)
    }

    #[test]
    fn test_hash_produces_valid_bcrypt_hash() {
        let hash = fast_hasher().hash("my_secure_password123!").unwrap();

        assert!(hash.starts_with("$2b$") || hash.starts_with("$2a$") || hash.starts_with("$2y$"));
        assert_eq!(hash.len(), 60);
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = fast_hasher();
        let hash1 = hasher.hash("same_password").unwrap();
        let hash2 = hasher.hash("same_password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same_password", &hash1));
        assert!(hasher.verify("same_password", &hash2));
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hasher = fast_hasher();
        let hash = hasher.hash("correct_password").unwrap();

        assert!(hasher.verify("correct_password", &hash));
        assert!(!hasher.verify("wrong_password", &hash));
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hash = fast_hasher().hash("visible_secret").unwrap();
        assert!(!hash.contains("visible_secret"));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        let hasher = fast_hasher();

        assert!(!hasher.verify("password", "not_a_valid_hash"));
        assert!(!hasher.verify("password", ""));
        assert!(!hasher.verify("password", "$2b$12$truncated"));
    }

    #[test]
    fn test_verify_unicode_password() {
        let hasher = fast_hasher();
        let password = "contraseña_密码_🔐";
        let hash = hasher.hash(password).unwrap();

        assert!(hasher.verify(password, &hash));
    }

    #[test]
    fn test_default_cost() {
        let hasher = PasswordHasher::default();
        assert_eq!(hasher.cost, BCRYPT_COST);
    }
}
