//! Revocation of access tokens before their natural expiry
//!
//! Revoked tokens are recorded in an expiring key-value store under their raw
//! value, with a time-to-live equal to the token's remaining lifetime. An
//! entry therefore never outlives the token itself, which bounds the store to
//! the tokens revoked within one access-token window.
//!
//! [`RevocationStore`] holds the policy (skip non-positive TTLs); the backing
//! [`TtlStore`] only needs atomic set-with-TTL and existence checks. Redis is
//! the production backend, [`InMemoryTtlStore`] serves tests and single-node
//! development.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::core::auth::clock::{Clock, SystemClock};

/// Value stored under each revoked token key
const REVOKED_MARKER: &str = "revoked";

/// Revocation store errors
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error("Revocation store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for RevocationError {
    fn from(err: redis::RedisError) -> Self {
        RevocationError::Unavailable(err.to_string())
    }
}

/// Short, non-reversible identifier for a token, safe to put in logs
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

/// Expiring key-value backend
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Set `key` with a time-to-live in seconds. Callers guarantee `ttl_seconds > 0`.
    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> Result<(), RevocationError>;

    /// Whether `key` is present and not yet expired
    async fn exists(&self, key: &str) -> Result<bool, RevocationError>;
}

// ---------------- Redis Implementation ----------------

/// Redis-backed store shared by all service instances
#[derive(Clone)]
pub struct RedisTtlStore {
    manager: ConnectionManager,
}

impl RedisTtlStore {
    /// Connect to Redis and keep a managed, auto-reconnecting connection
    pub async fn connect(redis_url: &str) -> Result<Self, RevocationError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> Result<(), RevocationError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, REVOKED_MARKER, ttl_seconds as u64).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationError> {
        let mut conn = self.manager.clone();
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }
}

// ---------------- In-Memory Implementation ----------------

/// Process-local store with lazy eviction
#[derive(Clone)]
pub struct InMemoryTtlStore {
    entries: Arc<DashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryTtlStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryTtlStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Drop every entry whose TTL has elapsed, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before - self.entries.len()
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TtlStore for InMemoryTtlStore {
    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> Result<(), RevocationError> {
        let expires_at = self.clock.now() + Duration::seconds(ttl_seconds);
        self.entries.insert(key.to_string(), expires_at);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationError> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(expires_at) => *expires_at > now,
            None => return Ok(false),
        };
        if !live {
            self.entries.remove_if(key, |_, expires_at| *expires_at <= now);
        }
        Ok(live)
    }
}

// ---------------- Revocation Policy ----------------

/// Records revoked access tokens until they would have expired anyway
#[derive(Clone)]
pub struct RevocationStore {
    backend: Arc<dyn TtlStore>,
}

impl RevocationStore {
    pub fn new(backend: Arc<dyn TtlStore>) -> Self {
        Self { backend }
    }

    /// Revoke `token` for `ttl_seconds`. A non-positive TTL means the token
    /// has already expired naturally and nothing is written.
    pub async fn revoke(&self, token: &str, ttl_seconds: i64) -> Result<(), RevocationError> {
        if ttl_seconds <= 0 {
            tracing::debug!(
                token = %token_fingerprint(token),
                ttl_seconds,
                "Skipping revocation of already-expired token"
            );
            return Ok(());
        }

        self.backend.set_with_ttl(token, ttl_seconds).await?;
        tracing::debug!(token = %token_fingerprint(token), ttl_seconds, "Token revoked");
        Ok(())
    }

    /// Whether `token` is currently revoked. Never-revoked and
    /// revoked-then-evicted tokens both report `false`.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        self.backend.exists(token).await
    }
}
