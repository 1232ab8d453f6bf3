//! Collaborator interfaces of the profile form
//!
//! The form only talks to persistence, file storage and notifications through
//! these traits. Production adapters live in `core::db`, `core::storage` and
//! `core::notifications`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::db::models::User;
use crate::core::notifications::Notification;
use crate::core::storage::{StorageError, UploadedFile};

/// Errors raised by a [`UserStore`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserStoreError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("User store error: {0}")]
    Backend(String),
}

/// Persistence of user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserStoreError>;

    /// Whether any user other than `ignore` already uses this email
    async fn email_taken(&self, email: &str, ignore: Option<Uuid>)
    -> Result<bool, UserStoreError>;

    /// Persist name, email, avatar and password hash of an existing user
    async fn save(&self, user: &User) -> Result<User, UserStoreError>;
}

/// A named file storage target
#[async_trait]
pub trait StorageDisk: Send + Sync {
    fn name(&self) -> &str;

    /// Store a file under `directory` with a generated name; returns its path
    async fn store(&self, directory: &str, file: &UploadedFile) -> Result<String, StorageError>;

    /// Delete a file; `false` when it did not exist
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Sink for user-visible notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
