//! Order API endpoints
//!
//! - POST /orders - Place an order (auth required)
//! - GET /orders - List the caller's orders
//! - GET /orders/all - List every order (admin)
//! - GET /orders/{id} - Get one order (owner or admin)
//! - PATCH /orders/{id}/state - Change an order's state (admin)

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{OrderError, OrderRead, OrderService};
use crate::core::auth::{AdminUser, ApiError, AuthService, CurrentUser};
use crate::core::catalog::CatalogError;
use crate::core::db::models::{CreateOrder, UpdateOrderState};

/// Order API state
#[derive(Clone)]
pub struct OrdersApiState {
    pub auth_service: AuthService,
    pub order_service: OrderService,
}

impl FromRef<Arc<OrdersApiState>> for AuthService {
    fn from_ref(state: &Arc<OrdersApiState>) -> Self {
        state.auth_service.clone()
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OrderError::NotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            OrderError::Forbidden => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
            OrderError::Invalid(_) => (StatusCode::BAD_REQUEST, "INVALID_ORDER"),
            OrderError::Catalog(CatalogError::ProductNotFound(_)) => {
                (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND")
            }
            OrderError::Catalog(_) => (StatusCode::BAD_GATEWAY, "CATALOG_UNAVAILABLE"),
            OrderError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match &self {
            OrderError::Database(msg) => {
                tracing::error!("Order database error: {}", msg);
                "Internal error".to_string()
            }
            OrderError::Catalog(err) if status == StatusCode::BAD_GATEWAY => {
                tracing::error!("Catalog error: {}", err);
                "Product catalog unavailable".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ApiError::new(message, code))).into_response()
    }
}

/// Create the order API router
pub fn orders_api_router(state: OrdersApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/orders", get(list_own_handler).post(create_handler))
        .route("/orders/all", get(list_all_handler))
        .route("/orders/{id}", get(get_handler))
        .route("/orders/{id}/state", patch(update_state_handler))
        .with_state(state)
}

/// POST /orders
async fn create_handler(
    State(state): State<Arc<OrdersApiState>>,
    CurrentUser(principal): CurrentUser,
    Json(request): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderRead>), OrderError> {
    let order = state.order_service.create(&principal, &request).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
async fn list_own_handler(
    State(state): State<Arc<OrdersApiState>>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<OrderRead>>, OrderError> {
    let orders = state.order_service.list_own(&principal).await?;
    Ok(Json(orders))
}

/// GET /orders/all
async fn list_all_handler(
    State(state): State<Arc<OrdersApiState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<OrderRead>>, OrderError> {
    let orders = state.order_service.list_all().await?;
    Ok(Json(orders))
}

/// GET /orders/{id}
async fn get_handler(
    State(state): State<Arc<OrdersApiState>>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderRead>, OrderError> {
    let order = state.order_service.get(&principal, id).await?;
    Ok(Json(order))
}

/// PATCH /orders/{id}/state
async fn update_state_handler(
    State(state): State<Arc<OrdersApiState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderState>,
) -> Result<Json<OrderRead>, OrderError> {
    tracing::debug!(admin = %admin.user_id, order_id = %id, "Order state change requested");

    let order = state.order_service.update_state(id, request.state).await?;
    Ok(Json(order))
}
