//! Database module
//!
//! Connectivity, models, and repositories for persistent storage using
//! PostgreSQL and SQLx.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::*;
pub use pool::{DbConfig, DbError, connect};
pub use repositories::{UserRepository, UserRepositoryError};

pub use sqlx::PgPool;
