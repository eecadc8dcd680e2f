//! Validator configuration.
//!
//! [`ValidatorConfig`] can be built in code through its builder, which
//! validates on `build()`, or deserialized from a service's config file, after
//! which [`ValidatorConfig::validate`] must be called. Durations use
//! human-readable strings such as `"5m"` or `"24h"`.
//!
//! ```
//! use std::time::Duration;
//!
//! use jsonwebtoken::Algorithm;
//! use warden_authn::ValidatorConfig;
//!
//! let config = ValidatorConfig::builder()
//!     .client_id("billing-api")
//!     .scope("invoices.read")
//!     .allowed_algorithms(vec![Algorithm::RS256])
//!     .cache_ttl(Duration::from_secs(60))
//!     .build()?;
//! assert_eq!(config.client_id(), "billing-api");
//! # Ok::<(), warden_authn::error::ConfigError>(())
//! ```

use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL},
    error::ConfigError,
    revocation::DEFAULT_REVOCATION_RETENTION,
    validation::{DEFAULT_ALLOWED_ALGORITHMS, DEFAULT_ISSUED_AT_LEEWAY, validate_algorithm_policy},
};

/// Configuration for a [`TokenValidator`](crate::TokenValidator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Expected audience, compared against `aud`.
    pub(crate) client_id: String,

    /// Scope that `scp` must contain. Absent or empty disables the check.
    #[serde(default)]
    pub(crate) scope: Option<String>,

    /// Signature algorithms accepted.
    #[serde(default = "default_allowed_algorithms")]
    pub(crate) allowed_algorithms: Vec<Algorithm>,

    /// Upper bound on how long a successful validation is reused.
    /// Zero disables caching.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub(crate) cache_ttl: Duration,

    /// Maximum number of cached validations.
    #[serde(default = "default_cache_capacity")]
    pub(crate) cache_capacity: u64,

    /// How long a revocation is remembered.
    #[serde(with = "humantime_serde", default = "default_revocation_retention")]
    pub(crate) revocation_retention: Duration,

    /// Tolerated clock drift for `iat` in the future.
    #[serde(with = "humantime_serde", default = "default_issued_at_leeway")]
    pub(crate) issued_at_leeway: Duration,
}

fn default_allowed_algorithms() -> Vec<Algorithm> {
    DEFAULT_ALLOWED_ALGORITHMS.to_vec()
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_revocation_retention() -> Duration {
    DEFAULT_REVOCATION_RETENTION
}

fn default_issued_at_leeway() -> Duration {
    DEFAULT_ISSUED_AT_LEEWAY
}

#[bon::bon]
impl ValidatorConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `scope` - Required scope (default: none).
    /// * `allowed_algorithms` - Accepted algorithms (default: RS256, RS384, RS512, ES256, ES384).
    /// * `cache_ttl` - Validation cache TTL (default: 5 minutes).
    /// * `cache_capacity` - Validation cache size (default: 10 000).
    /// * `revocation_retention` - Revocation memory (default: 24 hours).
    /// * `issued_at_leeway` - `iat` clock drift tolerance (default: 5 minutes).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] under the same conditions as [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into)] client_id: String,
        #[builder(into)] scope: Option<String>,
        #[builder(default = default_allowed_algorithms())] allowed_algorithms: Vec<Algorithm>,
        #[builder(default = DEFAULT_CACHE_TTL)] cache_ttl: Duration,
        #[builder(default = DEFAULT_CACHE_CAPACITY)] cache_capacity: u64,
        #[builder(default = DEFAULT_REVOCATION_RETENTION)] revocation_retention: Duration,
        #[builder(default = DEFAULT_ISSUED_AT_LEEWAY)] issued_at_leeway: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            client_id,
            scope: scope.filter(|s| !s.is_empty()),
            allowed_algorithms,
            cache_ttl,
            cache_capacity,
            revocation_retention,
            issued_at_leeway,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `client_id` is empty or whitespace
    /// - `allowed_algorithms` is empty or names an HMAC algorithm
    /// - `revocation_retention` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        validate_algorithm_policy(&self.allowed_algorithms)?;
        if self.revocation_retention.is_zero() {
            return Err(ConfigError::ZeroValue("revocation_retention"));
        }
        Ok(())
    }

    /// Expected audience.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Required scope, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref().filter(|s| !s.is_empty())
    }

    /// Accepted signature algorithms.
    #[must_use]
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Validation cache TTL.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Validation cache capacity.
    #[must_use]
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Revocation retention window.
    #[must_use]
    pub fn revocation_retention(&self) -> Duration {
        self.revocation_retention
    }

    /// `iat` clock drift tolerance.
    #[must_use]
    pub fn issued_at_leeway(&self) -> Duration {
        self.issued_at_leeway
    }

    /// Returns `true` if successful validations are cached.
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero() && self.cache_capacity > 0
    }
}
