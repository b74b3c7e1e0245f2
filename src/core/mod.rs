//! Domain modules and their HTTP surfaces

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod exports;
pub mod orders;
pub mod products;
pub mod users;
