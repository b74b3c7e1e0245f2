//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /auth/token - Login with username or email, get a token pair.
//!   Accepts a JSON body or an OAuth2 password-grant form.
//! - POST /auth/token/refresh - Exchange a refresh token for a new pair
//! - POST /auth/logout - Revoke the presented access token
//! - GET /auth/me - Get current user info
//!
//! Also hosts the request extractors other routers use to authenticate:
//! [`CurrentUser`] for any authenticated caller and [`AdminUser`] for admins.

use axum::{
    Form, Json, Router,
    extract::{FromRef, FromRequest, FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::jwt::TokenPair;
use crate::core::auth::service::{AuthError, AuthService, LoginRequest, Principal, RefreshRequest};
use crate::core::db::models::UserResponse;

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

impl FromRef<Arc<AuthApiState>> for AuthService {
    fn from_ref(state: &Arc<AuthApiState>) -> Self {
        state.auth_service.clone()
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::TokenRevoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"),
            AuthError::InactiveOrMissingUser => (StatusCode::UNAUTHORIZED, "INACTIVE_USER"),
            AuthError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = match &self {
            AuthError::Internal(msg) => {
                tracing::error!("Auth internal error: {}", msg);
                ApiError::new("Internal error", code)
            }
            _ => ApiError::new(self.to_string(), code),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Response for logout
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

// ============================================================================
// Extractors
// ============================================================================

/// Any caller presenting a valid, unrevoked access token for an active user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthService::from_ref(state);
        let token = extract_bearer_token(&parts.headers)?;
        let principal = auth.resolve_identity(&token).await?;
        Ok(CurrentUser(principal))
    }
}

/// Like [`CurrentUser`], but only for administrators
#[derive(Debug, Clone)]
pub struct AdminUser(pub Principal);

impl<S> FromRequestParts<S> for AdminUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(principal) = CurrentUser::from_request_parts(parts, state).await?;
        principal.require_admin()?;
        Ok(AdminUser(principal))
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/auth/token", post(login_handler))
        .route("/auth/token/refresh", post(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler))
        .with_state(state)
}

/// Login credentials from either a JSON body or a form-urlencoded body.
/// Extra OAuth2 form fields such as `grant_type` and `scope` are ignored.
pub struct LoginPayload(pub LoginRequest);

impl<S> FromRequest<S> for LoginPayload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let request = if is_form {
            let Form(request) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            request
        } else {
            let Json(request) = Json::<LoginRequest>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            request
        };

        Ok(Self(request))
    }
}

/// POST /auth/token
/// Login and get access/refresh tokens
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    LoginPayload(request): LoginPayload,
) -> Result<Json<TokenPair>, AuthError> {
    let tokens = state
        .auth_service
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(tokens))
}

/// POST /auth/token/refresh
/// Refresh the token pair using a refresh token
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    tracing::debug!("Token refresh request");

    let tokens = state.auth_service.refresh(&request.refresh_token).await?;

    Ok(Json(tokens))
}

/// POST /auth/logout
/// Revoke the bearer token; unusable tokens are accepted silently
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AuthError> {
    let token = extract_bearer_token(&headers)?;

    state.auth_service.logout(&token).await?;

    Ok(Json(LogoutResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// GET /auth/me
/// Get current user info from access token
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AuthError> {
    let token = extract_bearer_token(&headers)?;

    let (_, user) = state.auth_service.resolve_user(&token).await?;

    Ok(Json(user.into()))
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::InvalidToken)?;

    // Auth schemes are case-insensitive
    let (scheme, token) = auth_header
        .trim_start()
        .split_once(' ')
        .ok_or(AuthError::InvalidToken)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token.to_string())
}
