//! Authentication service
//!
//! Orchestrates login, refresh, logout and per-request identity resolution.
//! Token validity is the conjunction of two independent checks: the signed
//! claims verified by [`JwtService`] and the absence of the raw token from the
//! [`RevocationStore`]. Neither check knows about the other.
//!
//! Refresh tokens are not rotated: a used refresh token stays valid until its
//! own expiry. The role in a refreshed access token is taken from the current
//! user record, so role changes and deactivation take effect on refresh.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::auth::password::PasswordHasher;
use crate::core::auth::revocation::{RevocationError, RevocationStore, token_fingerprint};
use crate::core::config::RevocationFailurePolicy;
use crate::core::db::models::{Role, User};
use crate::core::db::repositories::UserRepositoryError;

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("User inactive or not found")]
    InactiveOrMissingUser,

    #[error("Token store unavailable")]
    StoreUnavailable,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::InvalidToken => AuthError::InvalidToken,
            JwtError::EncodingError(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<RevocationError> for AuthError {
    fn from(err: RevocationError) -> Self {
        tracing::error!("{}", err);
        AuthError::StoreUnavailable
    }
}

/// Read-only view of user storage needed for authentication
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Find a user whose username or email equals `identifier`
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError>;
}

/// Login request data; `username` accepts a username or an email
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Identity attached to an authenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    /// Role snapshot from the access token
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reject anyone who is not an administrator
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserLookup>,
    jwt: JwtService,
    revocations: RevocationStore,
    hasher: PasswordHasher,
    // Hash checked for unknown users so their login costs one bcrypt verify too
    dummy_hash: Arc<OnceLock<String>>,
    policy: RevocationFailurePolicy,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserLookup>,
        jwt: JwtService,
        revocations: RevocationStore,
        policy: RevocationFailurePolicy,
    ) -> Self {
        Self {
            users,
            jwt,
            revocations,
            hasher: PasswordHasher::default(),
            dummy_hash: Arc::new(OnceLock::new()),
            policy,
        }
    }

    /// Replace the password hasher used for verification
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self.dummy_hash = Arc::new(OnceLock::new());
        self
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Authenticate by username or email and mint a fresh token pair.
    ///
    /// Unknown users and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AuthError> {
        let Some(user) = self.users.find_by_username_or_email(identifier).await? else {
            let _ = self.hasher.verify(password, self.dummy_hash());
            tracing::info!(identifier, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused: user inactive");
            return Err(AuthError::InactiveOrMissingUser);
        }

        let tokens = self.jwt.generate_token_pair(user.id, user.role)?;
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(tokens)
    }

    /// Exchange a refresh token for a new pair. The old refresh token is left valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.jwt.verify_refresh(refresh_token)?;
        let user = self.load_active_user(user_id).await?;

        let tokens = self.jwt.generate_token_pair(user.id, user.role)?;
        tracing::debug!(user_id = %user.id, role = %user.role, "Token pair refreshed");

        Ok(tokens)
    }

    /// Revoke an access token for the rest of its lifetime.
    ///
    /// Malformed and already-expired tokens are ignored. A failed store write
    /// is returned as [`AuthError::StoreUnavailable`], since the token would
    /// otherwise remain usable.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = match self.jwt.verify_access(access_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(
                    token = %token_fingerprint(access_token),
                    "Logout with unusable token ignored: {}",
                    e
                );
                return Ok(());
            }
        };

        let ttl_seconds = claims.exp - self.jwt.now_timestamp();
        self.revocations.revoke(access_token, ttl_seconds).await?;

        tracing::info!(
            user_id = %claims.sub,
            token = %token_fingerprint(access_token),
            ttl_seconds,
            "User logged out"
        );
        Ok(())
    }

    /// Resolve an access token to the identity it grants
    pub async fn resolve_identity(&self, access_token: &str) -> Result<Principal, AuthError> {
        let (principal, _) = self.resolve_user(access_token).await?;
        Ok(principal)
    }

    /// Like [`resolve_identity`](Self::resolve_identity), also returning the loaded user
    pub async fn resolve_user(&self, access_token: &str) -> Result<(Principal, User), AuthError> {
        self.check_not_revoked(access_token).await?;

        let claims = self.jwt.verify_access(access_token)?;
        let user = self.load_active_user(claims.user_id()?).await?;

        let principal = Principal {
            user_id: user.id,
            role: claims.role,
        };
        Ok((principal, user))
    }

    async fn check_not_revoked(&self, access_token: &str) -> Result<(), AuthError> {
        match self.revocations.is_revoked(access_token).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(AuthError::TokenRevoked),
            Err(e) => match self.policy {
                RevocationFailurePolicy::FailClosed => {
                    tracing::error!("Rejecting request, revocation check failed: {}", e);
                    Err(AuthError::StoreUnavailable)
                }
                RevocationFailurePolicy::FailOpen => {
                    tracing::warn!(
                        token = %token_fingerprint(access_token),
                        "Revocation check failed, accepting token: {}",
                        e
                    );
                    Ok(())
                }
            },
        }
    }

    fn dummy_hash(&self) -> &str {
        self.dummy_hash
            .get_or_init(|| self.hasher.hash("unknown-user").unwrap_or_default())
    }

    async fn load_active_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::InactiveOrMissingUser),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::testing::{AuthFixture, PASSWORD};
    use chrono::Duration;

    fn fixture() -> AuthFixture {
        AuthFixture::new()
    }

    // ========================================================================
    // Login Tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_by_username_and_email() {
        let f = fixture();

        let by_name = f.service.login("alice", PASSWORD).await.unwrap();
        let by_email = f.service.login("alice@example.com", PASSWORD).await.unwrap();

        for tokens in [by_name, by_email] {
            let claims = f.service.jwt().verify_access(&tokens.access_token).unwrap();
            assert_eq!(claims.user_id().unwrap(), f.client.id);
            assert_eq!(claims.role, Role::Client);
            assert_eq!(f.service.jwt().verify_refresh(&tokens.refresh_token).unwrap(), f.client.id);
            assert_eq!(tokens.token_type, "bearer");
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password_or_unknown_user() {
        let f = fixture();

        assert!(matches!(
            f.service.login("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            f.service.login("bob", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_still_runs_password_check() {
        let f = fixture();
        assert!(f.service.dummy_hash.get().is_none());

        assert!(matches!(
            f.service.login("nobody", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));

        let dummy = f.service.dummy_hash.get().unwrap();
        assert!(dummy.starts_with("$2b$04$"));
    }

    #[tokio::test]
    async fn test_login_inactive_user() {
        let f = fixture();
        f.users.modify(f.client.id, |u| u.is_active = false);

        assert!(matches!(
            f.service.login("alice", PASSWORD).await,
            Err(AuthError::InactiveOrMissingUser)
        ));
        // Wrong password still reads as bad credentials
        assert!(matches!(
            f.service.login("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_with_malformed_stored_hash() {
        let f = fixture();
        f.users.modify(f.client.id, |u| u.password_hash = "not-a-bcrypt-hash".to_string());

        assert!(matches!(
            f.service.login("alice", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    // ========================================================================
    // Identity Resolution Tests
    // ========================================================================

    #[tokio::test]
    async fn test_access_token_lifecycle() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.clock.advance(Duration::minutes(10));
        let principal = f.service.resolve_identity(&tokens.access_token).await.unwrap();
        assert_eq!(principal.user_id, f.client.id);
        assert_eq!(principal.role, Role::Client);

        f.clock.advance(Duration::minutes(10));
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_revoked_before_expiry() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.clock.advance(Duration::minutes(5));
        f.service.logout(&tokens.access_token).await.unwrap();

        f.clock.advance(Duration::minutes(1));
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_for_remaining_lifetime_only() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.clock.advance(Duration::minutes(5));
        f.service.logout(&tokens.access_token).await.unwrap();
        assert_eq!(f.memory_store.len(), 1);

        f.clock.advance(Duration::minutes(10) - Duration::seconds(1));
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenRevoked)
        ));
        assert_eq!(f.memory_store.purge_expired(), 0);

        // Entry and token expire together
        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.memory_store.purge_expired(), 1);
        assert!(f.memory_store.is_empty());
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_logout_is_a_layer_above_signature() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.service.logout(&tokens.access_token).await.unwrap();

        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenRevoked)
        ));
        assert!(f.service.jwt().verify_access(&tokens.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_logout_leaves_other_tokens_alone() {
        let f = fixture();
        let first = f.service.login("alice", PASSWORD).await.unwrap();
        let second = f.service.login("alice", PASSWORD).await.unwrap();

        f.service.logout(&first.access_token).await.unwrap();

        assert!(f.service.resolve_identity(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_rejects_garbage_and_refresh_tokens() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        assert!(matches!(
            f.service.resolve_identity("garbage").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            f.service.resolve_identity(&tokens.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_resolve_rejects_inactive_or_deleted_user() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.users.modify(f.client.id, |u| u.is_active = false);
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::InactiveOrMissingUser)
        ));

        f.users.remove(f.client.id);
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::InactiveOrMissingUser)
        ));
    }

    #[tokio::test]
    async fn test_role_comes_from_token_snapshot() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.users.modify(f.client.id, |u| u.role = Role::Admin);

        let principal = f.service.resolve_identity(&tokens.access_token).await.unwrap();
        assert_eq!(principal.role, Role::Client);
        assert!(matches!(principal.require_admin(), Err(AuthError::Forbidden)));
    }

    // ========================================================================
    // Logout Tests
    // ========================================================================

    #[tokio::test]
    async fn test_logout_with_garbage_or_expired_token_is_noop() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        assert!(f.service.logout("not.a.token").await.is_ok());

        f.clock.advance(Duration::minutes(15));
        assert!(f.service.logout(&tokens.access_token).await.is_ok());
        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_logout_surfaces_store_failure() {
        let f = AuthFixture::unavailable_store(RevocationFailurePolicy::FailOpen);
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        assert!(matches!(
            f.service.logout(&tokens.access_token).await,
            Err(AuthError::StoreUnavailable)
        ));
    }

    // ========================================================================
    // Revocation Failure Policy Tests
    // ========================================================================

    #[tokio::test]
    async fn test_store_failure_fail_closed() {
        let f = AuthFixture::unavailable_store(RevocationFailurePolicy::FailClosed);
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        assert!(matches!(
            f.service.resolve_identity(&tokens.access_token).await,
            Err(AuthError::StoreUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_store_failure_fail_open() {
        let f = AuthFixture::unavailable_store(RevocationFailurePolicy::FailOpen);
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        let principal = f.service.resolve_identity(&tokens.access_token).await.unwrap();
        assert_eq!(principal.user_id, f.client.id);

        // Signature and expiry still apply
        assert!(matches!(
            f.service.resolve_identity("garbage").await,
            Err(AuthError::InvalidToken)
        ));
    }

    // ========================================================================
    // Refresh Tests
    // ========================================================================

    #[tokio::test]
    async fn test_refresh_mints_new_pair_with_current_role() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.users.modify(f.client.id, |u| u.role = Role::Admin);
        f.clock.advance(Duration::minutes(1));

        let refreshed = f.service.refresh(&tokens.refresh_token).await.unwrap();
        assert_ne!(refreshed.access_token, tokens.access_token);

        let principal = f.service.resolve_identity(&refreshed.access_token).await.unwrap();
        assert_eq!(principal.role, Role::Admin);
        assert!(principal.require_admin().is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_not_rotated() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        f.service.refresh(&tokens.refresh_token).await.unwrap();
        assert!(f.service.refresh(&tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_failures() {
        let f = fixture();
        let tokens = f.service.login("alice", PASSWORD).await.unwrap();

        assert!(matches!(
            f.service.refresh(&tokens.access_token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            f.service.refresh("garbage").await,
            Err(AuthError::InvalidToken)
        ));

        f.users.modify(f.client.id, |u| u.is_active = false);
        assert!(matches!(
            f.service.refresh(&tokens.refresh_token).await,
            Err(AuthError::InactiveOrMissingUser)
        ));

        f.users.modify(f.client.id, |u| u.is_active = true);
        f.clock.advance(Duration::days(7));
        assert!(matches!(
            f.service.refresh(&tokens.refresh_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    // ========================================================================
    // Error Conversion Tests
    // ========================================================================

    #[test]
    fn test_auth_error_display() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AuthError::TokenRevoked.to_string(), "Token revoked");
        assert_eq!(
            AuthError::InactiveOrMissingUser.to_string(),
            "User inactive or not found"
        );
        assert_eq!(AuthError::Forbidden.to_string(), "Insufficient permissions");
    }

    #[test]
    fn test_auth_error_from_jwt_error() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::TokenExpired));
        assert!(matches!(AuthError::from(JwtError::InvalidToken), AuthError::InvalidToken));
        assert!(matches!(
            AuthError::from(JwtError::EncodingError("x".to_string())),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn test_auth_error_from_store_error() {
        let err: AuthError = RevocationError::Unavailable("down".to_string()).into();
        assert!(matches!(err, AuthError::StoreUnavailable));
    }

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"username": "user@example.com", "password": "Password123"}"#;

        let request: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.username, "user@example.com");
        assert_eq!(request.password, "Password123");
    }
}
