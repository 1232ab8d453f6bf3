//! User repository for database operations

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateUser, User};
use crate::core::profile::ports::{UserStore, UserStoreError};

/// Name of the unique index on `users.email`
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_unique";

const USER_COLUMNS: &str = "id, name, email, avatar, password_hash, created_at, updated_at";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<UserRepositoryError> for UserStoreError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => UserStoreError::NotFound,
            UserRepositoryError::EmailAlreadyExists => UserStoreError::EmailAlreadyExists,
            UserRepositoryError::DatabaseError(e) => UserStoreError::Backend(e.to_string()),
        }
    }
}

/// Map a unique violation on the email index, pass anything else through
fn map_write_error(err: sqlx::Error) -> UserRepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
        && db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT)
    {
        return UserRepositoryError::EmailAlreadyExists;
    }
    UserRepositoryError::DatabaseError(err)
}

/// User repository backed by PostgreSQL
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user (password_hash should already be hashed)
    pub async fn create(&self, dto: &CreateUser) -> Result<User, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&dto.name)
        .bind(&dto.email)
        .bind(&dto.password_hash)
        .bind(&dto.avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        tracing::info!("Created user {}", user.id);
        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Whether an email is used by a user other than `ignore`
    pub async fn email_exists_except(
        &self,
        email: &str,
        ignore: Option<Uuid>,
    ) -> Result<bool, UserRepositoryError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(ignore)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Write the editable columns of a user
    pub async fn update(&self, user: &User) -> Result<User, UserRepositoryError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                name = $2,
                email = $3,
                avatar = $4,
                password_hash = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or(UserRepositoryError::NotFound)?;

        Ok(updated)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserStoreError> {
        Ok(UserRepository::find_by_id(self, id).await?)
    }

    async fn email_taken(
        &self,
        email: &str,
        ignore: Option<Uuid>,
    ) -> Result<bool, UserStoreError> {
        Ok(self.email_exists_except(email, ignore).await?)
    }

    async fn save(&self, user: &User) -> Result<User, UserStoreError> {
        Ok(self.update(user).await?)
    }
}
