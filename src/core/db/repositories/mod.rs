//! Database repositories
//!
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with the database.

pub mod order;
pub mod user;

pub use order::{OrderRepository, OrderRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
