//! Export API endpoints
//!
//! - POST /exports - Download orders as CSV, Excel or PDF. Clients get their
//!   own orders; admins get every order, or one user's orders with `user_id`.

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use std::sync::Arc;

use super::{ExportError, ExportRequest};
use crate::core::auth::{ApiError, AuthService, CurrentUser};
use crate::core::orders::{OrderError, OrderService};

/// Export API state
#[derive(Clone)]
pub struct ExportsApiState {
    pub auth_service: AuthService,
    pub order_service: OrderService,
}

impl FromRef<Arc<ExportsApiState>> for AuthService {
    fn from_ref(state: &Arc<ExportsApiState>) -> Self {
        state.auth_service.clone()
    }
}

/// Export API errors
#[derive(Debug, thiserror::Error)]
pub enum ExportsApiError {
    #[error(transparent)]
    Orders(#[from] OrderError),

    #[error(transparent)]
    Render(#[from] ExportError),
}

impl IntoResponse for ExportsApiError {
    fn into_response(self) -> Response {
        match self {
            ExportsApiError::Orders(err) => err.into_response(),
            ExportsApiError::Render(err) => {
                tracing::error!("{}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiError::new("Export failed", "EXPORT_FAILED")),
                )
                    .into_response()
            }
        }
    }
}

/// Create the exports API router
pub fn exports_api_router(state: ExportsApiState) -> Router {
    Router::new()
        .route("/exports", post(export_handler))
        .with_state(Arc::new(state))
}

/// POST /exports
async fn export_handler(
    State(state): State<Arc<ExportsApiState>>,
    CurrentUser(principal): CurrentUser,
    Json(request): Json<ExportRequest>,
) -> Result<Response, ExportsApiError> {
    let orders = match (principal.is_admin(), request.user_id) {
        (true, Some(user_id)) => state.order_service.list_for_user(user_id).await?,
        (true, None) => state.order_service.list_all().await?,
        (false, _) => state.order_service.list_own(&principal).await?,
    };

    let body = request.format.render(&orders)?;
    let filename = format!(
        "orders_{}.{}",
        Utc::now().format("%Y%m%dT%H%M%S"),
        request.format.extension()
    );

    tracing::info!(
        user_id = %principal.user_id,
        orders = orders.len(),
        format = request.format.extension(),
        "Orders exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, request.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
