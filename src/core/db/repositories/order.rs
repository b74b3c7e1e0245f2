//! Order repository for database operations
//!
//! Orders and their lines are written in a single transaction; reads always
//! return the order together with its items.

use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::db::models::{CreateOrderItem, Order, OrderItem, OrderState, OrderWithItems};

/// Order repository error types
#[derive(Debug, thiserror::Error)]
pub enum OrderRepositoryError {
    #[error("Order not found")]
    NotFound,

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Order repository for database operations
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an order for `user_id` in the pending state
    pub async fn create(
        &self,
        user_id: Uuid,
        items: &[CreateOrderItem],
    ) -> Result<OrderWithItems, OrderRepositoryError> {
        if items.is_empty() {
            return Err(OrderRepositoryError::EmptyOrder);
        }

        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id, state)
            VALUES ($1, $2)
            RETURNING id, user_id, state, created_at
            "#,
        )
        .bind(user_id)
        .bind(OrderState::Pending)
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let line = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, order_id, product_id, quantity
                "#,
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(line);
        }

        tx.commit().await?;

        tracing::info!(order_id = %order.id, %user_id, items = lines.len(), "Order created");

        Ok(OrderWithItems {
            order,
            items: lines,
        })
    }

    /// Find an order with its items
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderWithItems>, OrderRepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, state, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match order {
            Some(order) => {
                let items = self.items_for(&[order.id]).await?;
                Ok(Some(OrderWithItems { order, items }))
            }
            None => Ok(None),
        }
    }

    /// Orders placed by `user_id`, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrderWithItems>, OrderRepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, state, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(orders).await
    }

    /// Every order in the system, newest first
    pub async fn list_all(&self) -> Result<Vec<OrderWithItems>, OrderRepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, state, created_at
            FROM orders
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(orders).await
    }

    /// Move an order to `state`
    pub async fn update_state(
        &self,
        id: Uuid,
        state: OrderState,
    ) -> Result<OrderWithItems, OrderRepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET state = $2
            WHERE id = $1
            RETURNING id, user_id, state, created_at
            "#,
        )
        .bind(id)
        .bind(state)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderRepositoryError::NotFound)?;

        let items = self.items_for(&[order.id]).await?;
        Ok(OrderWithItems { order, items })
    }

    async fn items_for(&self, order_ids: &[Uuid]) -> Result<Vec<OrderItem>, OrderRepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY product_id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // One query for all lines instead of one per order
    async fn attach_items(
        &self,
        orders: Vec<Order>,
    ) -> Result<Vec<OrderWithItems>, OrderRepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = self.items_for(&ids).await?;

        Ok(group_items(orders, items))
    }
}

/// Pair each order with its lines, keeping the order of both inputs
fn group_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderWithItems> {
    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}
