//! Authentication module
//!
//! This module provides authentication functionality including:
//! - Password hashing and verification
//! - Access and refresh token signing and validation
//! - Revocation of access tokens on logout
//! - The session service composing the above, and its REST endpoints

pub mod api;
pub mod clock;
pub mod jwt;
pub mod password;
pub mod revocation;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AdminUser, ApiError, AuthApiState, CurrentUser, auth_api_router};
pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{JwtConfig, JwtError, JwtService, TokenPair, TokenType};
pub use password::{PasswordError, PasswordHasher};
pub use revocation::{
    InMemoryTtlStore, RedisTtlStore, RevocationError, RevocationStore, TtlStore,
};
pub use service::{AuthError, AuthService, LoginRequest, Principal, RefreshRequest, UserLookup};
