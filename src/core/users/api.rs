//! User administration endpoints (admin only)
//!
//! - POST /users - Create a user
//! - GET /users - List users (`skip`, `limit`)
//! - GET /users/{id} - Get a user
//! - PATCH /users/{id} - Partially update a user
//! - DELETE /users/{id} - Delete a user

use axum::{
    Json, Router,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{UserError, validate_create, validate_update};
use crate::core::auth::{AdminUser, ApiError, AuthService};
use crate::core::db::models::{CreateUser, UpdateUser, UserResponse};
use crate::core::db::repositories::UserRepository;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Users API state
#[derive(Clone)]
pub struct UsersApiState {
    pub auth_service: AuthService,
    pub user_repo: UserRepository,
}

impl FromRef<Arc<UsersApiState>> for AuthService {
    fn from_ref(state: &Arc<UsersApiState>) -> Self {
        state.auth_service.clone()
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            UserError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            UserError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            UserError::Conflict(_) => (StatusCode::CONFLICT, "USER_EXISTS"),
            UserError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match &self {
            UserError::Internal(msg) => {
                tracing::error!("User administration error: {}", msg);
                "Internal error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ApiError::new(message, code))).into_response()
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Response for deletions
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Create the users API router
pub fn users_api_router(state: UsersApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/users", get(list_handler).post(create_handler))
        .route(
            "/users/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .with_state(state)
}

/// POST /users
async fn create_handler(
    State(state): State<Arc<UsersApiState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserResponse>), UserError> {
    validate_create(&request)?;

    let user = state.user_repo.create(&request).await?;
    tracing::info!(
        admin = %admin.user_id,
        user_id = %user.id,
        role = %user.role,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /users
async fn list_handler(
    State(state): State<Arc<UsersApiState>>,
    AdminUser(_): AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, UserError> {
    if query.skip < 0 || query.limit < 1 {
        return Err(UserError::Validation(
            "skip must be >= 0 and limit >= 1".to_string(),
        ));
    }

    let users = state
        .user_repo
        .list(query.skip, query.limit.min(MAX_PAGE_SIZE))
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /users/{id}
async fn get_handler(
    State(state): State<Arc<UsersApiState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, UserError> {
    let user = state
        .user_repo
        .find_by_id(id)
        .await?
        .ok_or(UserError::NotFound)?;

    Ok(Json(user.into()))
}

/// PATCH /users/{id}
async fn update_handler(
    State(state): State<Arc<UsersApiState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUser>,
) -> Result<Json<UserResponse>, UserError> {
    validate_update(&request)?;

    let user = state.user_repo.update(id, &request).await?;
    tracing::info!(admin = %admin.user_id, user_id = %id, "User updated");

    Ok(Json(user.into()))
}

/// DELETE /users/{id}
async fn delete_handler(
    State(state): State<Arc<UsersApiState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, UserError> {
    if !state.user_repo.delete(id).await? {
        return Err(UserError::NotFound);
    }
    tracing::info!(admin = %admin.user_id, user_id = %id, "User deleted");

    Ok(Json(DeleteResponse {
        message: "User deleted".to_string(),
    }))
}
