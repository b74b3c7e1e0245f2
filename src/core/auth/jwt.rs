//! JWT utilities for token generation and validation
//!
//! Two token categories, each with its own secret, both signed with HS256.
//! Access tokens are short-lived (15 minutes) and carry the user's role;
//! refresh tokens are long-lived (7 days) and carry only the subject.
//!
//! Expiry is checked against the service clock with no leeway: a token whose
//! `exp` equals the current second is already expired.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::clock::{Clock, SystemClock};
use crate::core::config::Config;
use crate::core::db::models::Role;

/// Default access token expiration time (15 minutes)
pub const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
pub const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,
    /// Secret for signing refresh tokens
    pub refresh_secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
}

impl JwtConfig {
    /// Create a new JWT configuration with default lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
        }
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }
}

impl From<&Config> for JwtConfig {
    fn from(config: &Config) -> Self {
        Self::new(&config.jwt_access_secret, &config.jwt_refresh_secret)
            .access_token_expiration(config.access_token_expiration_minutes)
            .refresh_token_expiration(config.refresh_token_expiration_days)
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field(
                "access_token_expiration_minutes",
                &self.access_token_expiration_minutes,
            )
            .field(
                "refresh_token_expiration_days",
                &self.refresh_token_expiration_days,
            )
            .finish()
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role snapshot taken when the token was minted
    pub role: Role,
    /// Token type, always `access`
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl AccessClaims {
    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Refresh token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "bearer")
    pub token_type: String,
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl JwtService {
    /// Create a new JWT service using the system clock
    pub fn new(config: JwtConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a JWT service bound to a specific clock
    pub fn with_clock(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
            clock,
        }
    }

    /// Current Unix timestamp according to the service clock
    pub fn now_timestamp(&self) -> i64 {
        self.clock.now().timestamp()
    }

    /// Default access token lifetime. Out-of-range values saturate and are
    /// rejected when signing.
    pub fn access_ttl(&self) -> Duration {
        Duration::try_minutes(self.config.access_token_expiration_minutes).unwrap_or(Duration::MAX)
    }

    /// Default refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        Duration::try_days(self.config.refresh_token_expiration_days).unwrap_or(Duration::MAX)
    }

    fn expiry_after(&self, now: DateTime<Utc>, ttl: Duration) -> Result<i64, JwtError> {
        now.checked_add_signed(ttl)
            .map(|exp| exp.timestamp())
            .ok_or_else(|| JwtError::EncodingError(format!("token lifetime {ttl} out of range")))
    }

    /// Sign an access token for `subject` with the given role and lifetime
    pub fn sign_access(
        &self,
        subject: Uuid,
        role: Role,
        ttl: Duration,
    ) -> Result<(String, i64), JwtError> {
        let now = self.clock.now();
        let exp = self.expiry_after(now, ttl)?;

        let claims = AccessClaims {
            sub: subject.to_string(),
            role,
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.access_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp))
    }

    /// Sign a refresh token for `subject` with the given lifetime
    pub fn sign_refresh(&self, subject: Uuid, ttl: Duration) -> Result<(String, i64), JwtError> {
        let now = self.clock.now();
        let exp = self.expiry_after(now, ttl)?;

        let claims = RefreshClaims {
            sub: subject.to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.refresh_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp))
    }

    /// Mint an access + refresh pair with the configured lifetimes
    pub fn generate_token_pair(&self, subject: Uuid, role: Role) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) = self.sign_access(subject, role, self.access_ttl())?;
        let (refresh_token, refresh_expires_at) = self.sign_refresh(subject, self.refresh_ttl())?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "bearer".to_string(),
        })
    }

    /// Verify an access token's signature and expiry
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims = decode::<AccessClaims>(token, &self.access_decoding, &Self::validation())
            .map_err(|e| {
                tracing::debug!("Access token rejected: {}", e);
                JwtError::InvalidToken
            })?
            .claims;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken);
        }
        claims.user_id()?;
        self.check_expiry(claims.exp)?;

        Ok(claims)
    }

    /// Verify a refresh token and return its subject
    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = decode::<RefreshClaims>(token, &self.refresh_decoding, &Self::validation())
            .map_err(|e| {
                tracing::debug!("Refresh token rejected: {}", e);
                JwtError::InvalidToken
            })?
            .claims;

        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::InvalidToken);
        }
        let subject = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)?;
        self.check_expiry(claims.exp)?;

        Ok(subject)
    }

    fn check_expiry(&self, exp: i64) -> Result<(), JwtError> {
        if exp <= self.now_timestamp() {
            return Err(JwtError::Expired);
        }
        Ok(())
    }

    // The library's own expiry check accepts `exp == now`, so it is disabled
    // here in favour of `check_expiry`.
    fn validation() -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}
