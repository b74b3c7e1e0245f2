//! Tienda - Order management backend
//!
//! Token authentication with server-side revocation, user administration,
//! and orders priced against an external product catalog.

pub mod app;
pub mod core;
