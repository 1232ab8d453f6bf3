//! Password hashing with bcrypt

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Password hashing error
#[derive(Debug, thiserror::Error)]
#[error("Password hashing failed: {0}")]
pub struct HashingError(String);

/// Bcrypt password hasher with a fixed cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    /// Costs outside bcrypt's 4..=31 range are clamped
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with automatic salt generation
    pub fn hash(&self, password: &str) -> Result<String, HashingError> {
        bcrypt::hash(password, self.cost).map_err(|e| HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashingError> {
        bcrypt::verify(password, hash).map_err(|e| HashingError(e.to_string()))
    }
}
