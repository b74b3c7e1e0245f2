//! Orders
//!
//! Clients place and read their own orders; administrators read every order
//! and move orders between states. Orders only store catalog product ids, so
//! every read is enriched with product data fetched from the catalog.

pub mod api;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::service::Principal;
use crate::core::catalog::{CatalogError, Product, ProductCatalog};
use crate::core::db::models::{CreateOrder, Order, OrderState, OrderWithItems};
use crate::core::db::repositories::{OrderRepository, OrderRepositoryError};

pub use api::{OrdersApiState, orders_api_router};

/// Order errors
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Invalid order: {0}")]
    Invalid(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<OrderRepositoryError> for OrderError {
    fn from(err: OrderRepositoryError) -> Self {
        match err {
            OrderRepositoryError::NotFound => OrderError::NotFound,
            OrderRepositoryError::EmptyOrder => OrderError::Invalid(err.to_string()),
            OrderRepositoryError::DatabaseError(e) => OrderError::Database(e.to_string()),
        }
    }
}

/// Order line with its catalog product
#[derive(Debug, Clone, Serialize)]
pub struct OrderItemRead {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
}

/// Order as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct OrderRead {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: OrderState,
    pub items: Vec<OrderItemRead>,
    pub total_amount: f64,
}

/// Order use cases on top of the repository and the catalog
#[derive(Clone)]
pub struct OrderService {
    repo: OrderRepository,
    catalog: Arc<dyn ProductCatalog>,
}

impl OrderService {
    pub fn new(repo: OrderRepository, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { repo, catalog }
    }

    /// Place an order for the caller. Every product must exist in the catalog.
    pub async fn create(
        &self,
        principal: &Principal,
        request: &CreateOrder,
    ) -> Result<OrderRead, OrderError> {
        validate_order(request)?;

        let product_ids = request.items.iter().map(|item| item.product_id);
        let products = fetch_products(self.catalog.as_ref(), product_ids).await?;

        let order = self.repo.create(principal.user_id, &request.items).await?;
        assemble(order, &products)
    }

    /// Read one order; clients may only read their own
    pub async fn get(&self, principal: &Principal, order_id: Uuid) -> Result<OrderRead, OrderError> {
        let order = self.repo.find_by_id(order_id).await?.ok_or(OrderError::NotFound)?;
        ensure_can_view(principal, &order.order)?;

        enrich_order(self.catalog.as_ref(), order).await
    }

    /// Orders placed by the caller, newest first
    pub async fn list_own(&self, principal: &Principal) -> Result<Vec<OrderRead>, OrderError> {
        self.list_for_user(principal.user_id).await
    }

    /// Orders placed by `user_id`, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderRead>, OrderError> {
        let orders = self.repo.list_for_user(user_id).await?;
        enrich_orders(self.catalog.as_ref(), orders).await
    }

    /// Every order, newest first
    pub async fn list_all(&self) -> Result<Vec<OrderRead>, OrderError> {
        let orders = self.repo.list_all().await?;
        enrich_orders(self.catalog.as_ref(), orders).await
    }

    pub async fn update_state(
        &self,
        order_id: Uuid,
        state: OrderState,
    ) -> Result<OrderRead, OrderError> {
        let order = self.repo.update_state(order_id, state).await?;
        tracing::info!(%order_id, %state, "Order state changed");

        enrich_order(self.catalog.as_ref(), order).await
    }
}

/// Reject empty orders and non-positive quantities
pub fn validate_order(request: &CreateOrder) -> Result<(), OrderError> {
    if request.items.is_empty() {
        return Err(OrderError::Invalid(
            "order must contain at least one item".to_string(),
        ));
    }

    if let Some(item) = request.items.iter().find(|item| item.quantity < 1) {
        return Err(OrderError::Invalid(format!(
            "quantity for product {} must be at least 1",
            item.product_id
        )));
    }

    Ok(())
}

/// Admins see everything, clients only their own orders
pub fn ensure_can_view(principal: &Principal, order: &Order) -> Result<(), OrderError> {
    if principal.is_admin() || order.user_id == principal.user_id {
        Ok(())
    } else {
        Err(OrderError::Forbidden)
    }
}

/// Enrich a single order with catalog data
pub async fn enrich_order(
    catalog: &dyn ProductCatalog,
    order: OrderWithItems,
) -> Result<OrderRead, OrderError> {
    let product_ids: Vec<i64> = order.items.iter().map(|item| item.product_id).collect();
    let products = fetch_products(catalog, product_ids.into_iter()).await?;
    assemble(order, &products)
}

/// Enrich many orders, fetching each distinct product once
pub async fn enrich_orders(
    catalog: &dyn ProductCatalog,
    orders: Vec<OrderWithItems>,
) -> Result<Vec<OrderRead>, OrderError> {
    let product_ids: Vec<i64> = orders
        .iter()
        .flat_map(|order| order.items.iter().map(|item| item.product_id))
        .collect();
    let products = fetch_products(catalog, product_ids.into_iter()).await?;

    orders
        .into_iter()
        .map(|order| assemble(order, &products))
        .collect()
}

// Lookups run concurrently; the first failure aborts the rest
async fn fetch_products(
    catalog: &dyn ProductCatalog,
    product_ids: impl Iterator<Item = i64>,
) -> Result<HashMap<i64, Product>, CatalogError> {
    let distinct: BTreeSet<i64> = product_ids.collect();
    let products = try_join_all(distinct.into_iter().map(|id| catalog.fetch_product(id))).await?;

    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

fn assemble(order: OrderWithItems, products: &HashMap<i64, Product>) -> Result<OrderRead, OrderError> {
    let mut total_amount = 0.0;
    let mut items = Vec::with_capacity(order.items.len());

    for item in order.items {
        let product = products
            .get(&item.product_id)
            .cloned()
            .ok_or(CatalogError::ProductNotFound(item.product_id))?;
        total_amount += product.price * f64::from(item.quantity);
        items.push(OrderItemRead {
            id: item.id,
            product,
            quantity: item.quantity,
        });
    }

    Ok(OrderRead {
        id: order.order.id,
        user_id: order.order.user_id,
        created_at: order.order.created_at,
        state: order.order.state,
        items,
        total_amount,
    })
}
