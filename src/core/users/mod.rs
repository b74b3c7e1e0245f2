//! User administration
//!
//! Input validation for user records and the first-start administrator
//! bootstrap. The admin-only REST endpoints live in [`api`].

pub mod api;

use crate::core::config::DefaultAdmin;
use crate::core::db::models::{CreateUser, Role, UpdateUser, User};
use crate::core::db::repositories::{UserRepository, UserRepositoryError};

pub use api::{UsersApiState, users_api_router};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

/// User management errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserRepositoryError> for UserError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => UserError::NotFound,
            UserRepositoryError::EmailAlreadyExists
            | UserRepositoryError::UsernameAlreadyExists => UserError::Conflict(err.to_string()),
            _ => UserError::Internal(err.to_string()),
        }
    }
}

/// Validate email format: `local@domain.tld`
pub fn validate_email(email: &str) -> Result<(), UserError> {
    let invalid = || UserError::Validation(format!("Invalid email: {email:?}"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(invalid());
    }

    Ok(())
}

/// Username must be 3-50 characters
pub fn validate_username(username: &str) -> Result<(), UserError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(UserError::Validation(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(UserError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_create(request: &CreateUser) -> Result<(), UserError> {
    validate_username(&request.username)?;
    validate_email(&request.email)?;
    validate_password(&request.password)
}

/// Only the fields present in the update are checked
pub fn validate_update(request: &UpdateUser) -> Result<(), UserError> {
    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    if let Some(password) = &request.password {
        validate_password(password)?;
    }
    Ok(())
}

/// Create the configured administrator unless an admin already exists.
///
/// Returns the created user, or `None` when nothing had to be done.
pub async fn ensure_default_admin(
    repo: &UserRepository,
    admin: &DefaultAdmin,
) -> Result<Option<User>, UserError> {
    if repo.admin_exists().await? {
        tracing::info!("An administrator already exists, skipping default admin creation");
        return Ok(None);
    }

    let password = admin.password.clone().ok_or_else(|| {
        UserError::Validation(
            "No administrator exists and DEFAULT_ADMIN_PASSWORD is not set".to_string(),
        )
    })?;

    let request = CreateUser {
        username: admin.username.clone(),
        email: admin.email.clone(),
        full_name: admin.full_name.clone(),
        password,
        role: Role::Admin,
    };
    validate_create(&request)?;

    let user = repo.create(&request).await?;
    tracing::info!(username = %user.username, "Default administrator created");

    Ok(Some(user))
}
