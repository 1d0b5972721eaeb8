//! JWT token handling
//!
//! Three independent token kinds share one HS256 secret: access, refresh and
//! reset/verify. Each has its own claim shape and lifetime.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};

use super::error::TokenError;
use super::models::{AccessClaims, RefreshClaims, ResetClaims};
use crate::LoanTrackerError;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .finish()
    }
}

impl JwtConfig {
    /// Build a config; an empty secret is rejected.
    pub fn new(secret: String) -> Result<Self, LoanTrackerError> {
        if secret.trim().is_empty() {
            return Err(LoanTrackerError::Config(
                "JWT signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret,
            access_ttl: Duration::hours(2),
            refresh_ttl: Duration::days(7),
            reset_ttl: Duration::hours(1),
        })
    }

    pub fn with_ttls(mut self, access: Duration, refresh: Duration, reset: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self.reset_ttl = reset;
        self
    }

    /// Read `JWT_SECRET` and the optional TTL overrides.
    pub fn from_env() -> Result<Self, LoanTrackerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup. Unparsable, non-positive or oversized TTLs
    /// are configuration errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoanTrackerError> {
        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| LoanTrackerError::Config("JWT_SECRET is not set".to_string()))?;
        let config = Self::new(secret)?;

        let access = ttl_setting(
            &lookup,
            "JWT_ACCESS_TTL_MINUTES",
            config.access_ttl,
            Duration::try_minutes,
        )?;
        let refresh = ttl_setting(
            &lookup,
            "JWT_REFRESH_TTL_HOURS",
            config.refresh_ttl,
            Duration::try_hours,
        )?;
        let reset = ttl_setting(
            &lookup,
            "JWT_RESET_TTL_MINUTES",
            config.reset_ttl,
            Duration::try_minutes,
        )?;

        Ok(config.with_ttls(access, refresh, reset))
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn reset_ttl(&self) -> Duration {
        self.reset_ttl
    }
}

/// Longest lifetime accepted for any token kind
const MAX_TTL_DAYS: i64 = 3650;

fn ttl_setting(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, LoanTrackerError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let invalid = || {
        LoanTrackerError::Config(format!("{} must be a positive integer, got {:?}", key, raw))
    };

    let value: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }
    let ttl = unit(value)
        .filter(|ttl| *ttl <= Duration::days(MAX_TTL_DAYS))
        .ok_or_else(|| {
            LoanTrackerError::Config(format!("{} exceeds {} days", key, MAX_TTL_DAYS))
        })?;
    Ok(ttl)
}

/// JWT manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify<C: DeserializeOwned + Clone>(&self, token: &str) -> Result<C, TokenError> {
        let data = decode::<C>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    pub fn issue_access(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        self.sign(claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    pub fn issue_refresh(&self, claims: &RefreshClaims) -> Result<String, TokenError> {
        self.sign(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    pub fn issue_reset(&self, claims: &ResetClaims) -> Result<String, TokenError> {
        self.sign(claims)
    }

    pub fn verify_reset(&self, token: &str) -> Result<ResetClaims, TokenError> {
        self.verify(token)
    }
}
