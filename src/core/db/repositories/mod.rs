//! Database repositories
//!
//! Repositories encapsulate data access logic and implement the persistence
//! ports the form depends on.

pub mod user;

pub use user::{UserRepository, UserRepositoryError};
