//! User repository for database operations
//!
//! Provides CRUD operations for users. Passwords are hashed with bcrypt before
//! they reach the database and are never read back in plain form.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::auth::service::UserLookup;
use crate::core::db::models::{CreateUser, Role, UpdateUser, User};

const USER_COLUMNS: &str =
    "id, username, email, full_name, password_hash, role, is_active, created_at, updated_at";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<PasswordError> for UserRepositoryError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::HashingError(msg) => UserRepositoryError::HashingError(msg),
        }
    }
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
    hasher: PasswordHasher,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self::with_hasher(pool, PasswordHasher::default())
    }

    /// Create a repository with a specific password hasher
    pub fn with_hasher(pool: PgPool, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    /// Create a new user; the plain text password is hashed here
    pub async fn create(&self, new_user: &CreateUser) -> Result<User, UserRepositoryError> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(UserRepositoryError::UsernameAlreadyExists);
        }

        if self.find_by_email(&new_user.email).await?.is_some() {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let password_hash = self.hasher.hash(&new_user.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, full_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&password_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

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

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by username
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user whose username or email equals `identifier`.
    /// An exact username match wins over an email match.
    pub async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Apply a partial update
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateUser,
    ) -> Result<User, UserRepositoryError> {
        if self.find_by_id(id).await?.is_none() {
            return Err(UserRepositoryError::NotFound);
        }

        // Check email uniqueness if being updated
        if let Some(ref email) = updates.email
            && let Some(existing) = self.find_by_email(email).await?
            && existing.id != id
        {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let password_hash = match &updates.password {
            Some(password) => Some(self.hasher.hash(password)?),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                is_active = COALESCE($6, is_active)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&updates.email)
        .bind(&updates.full_name)
        .bind(&password_hash)
        .bind(updates.role)
        .bind(updates.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    /// Delete a user by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List users with pagination
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<User>, UserRepositoryError> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Whether at least one administrator exists
    pub async fn admin_exists(&self) -> Result<bool, UserRepositoryError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
                .bind(Role::Admin)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists.0)
    }
}

#[async_trait]
impl UserLookup for UserRepository {
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        UserRepository::find_by_username_or_email(self, identifier).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        UserRepository::find_by_id(self, id).await
    }
}

/// Turn a unique-constraint violation that slipped past the pre-checks into
/// the matching domain error
fn map_unique_violation(err: sqlx::Error) -> UserRepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return match db_err.constraint() {
            Some(c) if c.contains("email") => UserRepositoryError::EmailAlreadyExists,
            _ => UserRepositoryError::UsernameAlreadyExists,
        };
    }
    UserRepositoryError::DatabaseError(err)
}
