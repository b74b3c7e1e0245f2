//! Product API endpoints
//!
//! - GET /products - List catalog products (`limit`, `skip`, `sort`,
//!   `category`, `min_price`, `max_price`)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::auth::ApiError;
use crate::core::catalog::{CatalogError, ProductCatalog, ProductPage, ProductQuery};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// Product API state
#[derive(Clone)]
pub struct ProductsApiState {
    pub catalog: Arc<dyn ProductCatalog>,
}

/// Product API errors
#[derive(Debug, thiserror::Error)]
pub enum ProductsApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Product catalog unavailable")]
    Catalog(#[from] CatalogError),
}

impl IntoResponse for ProductsApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ProductsApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ProductsApiError::Catalog(err) => {
                tracing::error!("Product listing failed: {}", err);
                (StatusCode::BAD_GATEWAY, "CATALOG_UNAVAILABLE")
            }
        };

        (status, Json(ApiError::new(self.to_string(), code))).into_response()
    }
}

/// Query string accepted by GET /products
#[derive(Debug, Deserialize)]
pub struct ListProductsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl TryFrom<ListProductsParams> for ProductQuery {
    type Error = ProductsApiError;

    fn try_from(params: ListProductsParams) -> Result<Self, Self::Error> {
        if !(1..=MAX_LIMIT).contains(&params.limit) {
            return Err(ProductsApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        for (name, value) in [("min_price", params.min_price), ("max_price", params.max_price)] {
            if value.is_some_and(|v| v < 0.0) {
                return Err(ProductsApiError::BadRequest(format!(
                    "{name} must not be negative"
                )));
            }
        }

        Ok(ProductQuery {
            limit: params.limit,
            skip: params.skip,
            sort: params.sort.filter(|s| !s.is_empty()),
            category: params.category.filter(|c| !c.is_empty()),
            min_price: params.min_price,
            max_price: params.max_price,
        })
    }
}

/// Create the products API router
pub fn products_api_router(state: ProductsApiState) -> Router {
    Router::new()
        .route("/products", get(list_handler))
        .with_state(Arc::new(state))
}

/// GET /products
async fn list_handler(
    State(state): State<Arc<ProductsApiState>>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<ProductPage>, ProductsApiError> {
    let query = ProductQuery::try_from(params)?;
    let page = state.catalog.list_products(&query).await?;

    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::testing::StaticCatalog;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> Router {
        let catalog = StaticCatalog::with_products(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        products_api_router(ProductsApiState {
            catalog: Arc::new(catalog),
        })
    }

    async fn fetch(uri: &str) -> Response {
        router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_products_defaults() {
        let response = fetch("/products").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let page: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(page["limit"], 10);
        assert_eq!(page["total"], 3);
        assert_eq!(page["products"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_products_pagination() {
        let response = fetch("/products?limit=1&skip=1").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let page: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(page["products"][0]["id"], 2);
    }

    #[tokio::test]
    async fn test_list_products_bounds() {
        assert_eq!(fetch("/products?limit=0").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fetch("/products?limit=101").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            fetch("/products?min_price=-1").await.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(fetch("/products?limit=100").await.status(), StatusCode::OK);
    }

    #[test]
    fn test_params_conversion() {
        let params = ListProductsParams {
            limit: 20,
            skip: 40,
            sort: Some("-price".to_string()),
            category: Some(String::new()),
            min_price: Some(5.0),
            max_price: None,
        };

        let query = ProductQuery::try_from(params).unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.skip, 40);
        assert_eq!(query.sort.as_deref(), Some("-price"));
        assert!(query.category.is_none());
    }

    #[test]
    fn test_catalog_failure_maps_to_bad_gateway() {
        let err = ProductsApiError::from(CatalogError::UpstreamStatus(500));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
