//! Authentication helpers
//!
//! - JWT access-token validation identifying the current user
//! - bcrypt password hashing

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use password::{DEFAULT_BCRYPT_COST, HashingError, PasswordHasher};
