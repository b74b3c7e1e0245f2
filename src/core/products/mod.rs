//! Product listing
//!
//! A thin proxy over the external catalog with bounded pagination.

pub mod api;

pub use api::{ProductsApiState, products_api_router};
