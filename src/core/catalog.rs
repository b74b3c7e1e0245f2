//! External product catalog client
//!
//! Products live in a third-party catalog (DummyJSON-compatible); orders only
//! store product ids and are enriched on read.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Catalog returned status {0}")]
    UpstreamStatus(u16),

    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Product as served by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// One page of catalog products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Listing parameters forwarded to the catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub limit: u32,
    pub skip: u32,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ProductQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("skip", self.skip.to_string()),
        ];
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        if let Some(min) = self.min_price {
            params.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            params.push(("maxPrice", max.to_string()));
        }
        params
    }
}

/// Read access to the product catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn fetch_product(&self, product_id: i64) -> Result<Product, CatalogError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, CatalogError>;
}

/// HTTP client for the catalog
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProductCatalog for CatalogClient {
    async fn fetch_product(&self, product_id: i64) -> Result<Product, CatalogError> {
        let url = format!("{}/products/{}", self.base_url, product_id);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<Product>().await?),
            StatusCode::NOT_FOUND => Err(CatalogError::ProductNotFound(product_id)),
            status => {
                tracing::warn!(product_id, %status, "Catalog product lookup failed");
                Err(CatalogError::UpstreamStatus(status.as_u16()))
            }
        }
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, CatalogError> {
        let url = format!("{}/products", self.base_url);
        let response = self.http.get(&url).query(&query.to_params()).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "Catalog product listing failed");
            return Err(CatalogError::UpstreamStatus(status.as_u16()));
        }

        Ok(response.json::<ProductPage>().await?)
    }
}
