//! Algorithm policy and claim rules.
//!
//! # Security
//!
//! - Only algorithms on the configured allow-list are ever verified, which
//!   defeats algorithm substitution (`alg` swapped to something weaker).
//! - Symmetric HMAC algorithms can never be allowed: a validator holding only
//!   public keys must not accept a token "signed" with one of them.
//! - `none` cannot be expressed as an [`Algorithm`] and is rejected while
//!   parsing the header.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;

use crate::{
    claims::{ClaimSet, ClaimValue},
    error::{AuthError, ConfigError},
};

/// Algorithms that are never accepted, whatever the configuration says.
pub const FORBIDDEN_ALGORITHMS: &[Algorithm] =
    &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Allow-list used when none is configured.
pub const DEFAULT_ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Maximum accepted length of a `kid` header, in bytes.
pub const MAX_KID_LENGTH: usize = 256;

/// Tolerated clock drift for `iat` in the future (5 minutes).
pub const DEFAULT_ISSUED_AT_LEEWAY: Duration = Duration::from_secs(300);

/// Optional prefix stripped from `aud` before comparison.
pub const AUDIENCE_PREFIX: &str = "api://";

/// Checks an algorithm allow-list against the security policy.
///
/// # Errors
///
/// Returns [`ConfigError::NoAlgorithms`] for an empty list and
/// [`ConfigError::ForbiddenAlgorithm`] if any entry is symmetric.
///
/// # Examples
///
/// ```
/// use jsonwebtoken::Algorithm;
/// use warden_authn::validation::validate_algorithm_policy;
///
/// assert!(validate_algorithm_policy(&[Algorithm::RS256, Algorithm::EdDSA]).is_ok());
/// assert!(validate_algorithm_policy(&[Algorithm::RS256, Algorithm::HS256]).is_err());
/// assert!(validate_algorithm_policy(&[]).is_err());
/// ```
pub fn validate_algorithm_policy(algorithms: &[Algorithm]) -> Result<(), ConfigError> {
    if algorithms.is_empty() {
        return Err(ConfigError::NoAlgorithms);
    }
    if let Some(alg) = algorithms.iter().find(|alg| FORBIDDEN_ALGORITHMS.contains(alg)) {
        return Err(ConfigError::ForbiddenAlgorithm(format!("{alg:?}")));
    }
    Ok(())
}

/// Checks a header algorithm against an allow-list.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if `alg` is forbidden or not allowed.
pub fn check_algorithm(alg: Algorithm, allowed: &[Algorithm]) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::invalid_token(format!(
            "algorithm {alg:?} is not allowed for security reasons"
        )));
    }
    if !allowed.contains(&alg) {
        return Err(AuthError::invalid_token(format!("algorithm {alg:?} is not in the allow-list")));
    }
    Ok(())
}

/// Checks a `kid` header before it reaches a key resolver.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the key id is empty, longer than
/// [`MAX_KID_LENGTH`], or contains control characters.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_token("key id is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::invalid_token(format!(
            "key id exceeds {MAX_KID_LENGTH} bytes"
        )));
    }
    if kid.chars().any(char::is_control) {
        return Err(AuthError::invalid_token("key id contains control characters"));
    }
    Ok(())
}

/// Validates `exp`, `iat` and `nbf` against `now`.
///
/// Absent claims pass. A time claim that is present but not a number fails.
///
/// # Errors
///
/// Returns [`AuthError::InvalidClaims`] with one of `token has expired`,
/// `token issued in the future` or `token not yet valid`.
pub fn validate_time_claims(
    claims: &ClaimSet,
    now: DateTime<Utc>,
    issued_at_leeway: Duration,
) -> Result<(), AuthError> {
    // Millisecond precision so a whole-second claim compares against the
    // real instant, not a truncated one.
    let now_ms = i128::from(now.timestamp_millis());
    let leeway_ms = i128::try_from(issued_at_leeway.as_millis()).unwrap_or(i128::MAX);
    let to_ms = |secs: i64| i128::from(secs) * 1000;

    match claims.expires_at() {
        ClaimValue::Present(exp) if to_ms(exp) < now_ms => {
            return Err(AuthError::invalid_claims("token has expired"));
        },
        ClaimValue::WrongType => return Err(AuthError::invalid_claims("invalid exp claim")),
        _ => {},
    }

    match claims.issued_at() {
        ClaimValue::Present(iat) if to_ms(iat) > now_ms.saturating_add(leeway_ms) => {
            return Err(AuthError::invalid_claims("token issued in the future"));
        },
        ClaimValue::WrongType => return Err(AuthError::invalid_claims("invalid iat claim")),
        _ => {},
    }

    match claims.not_before() {
        ClaimValue::Present(nbf) if to_ms(nbf) > now_ms => {
            return Err(AuthError::invalid_claims("token not yet valid"));
        },
        ClaimValue::WrongType => return Err(AuthError::invalid_claims("invalid nbf claim")),
        _ => {},
    }

    Ok(())
}

/// Validates `aud` against the expected audience.
///
/// Each audience value has an optional `api://` prefix stripped before an
/// exact comparison. An array audience passes if any entry matches.
///
/// # Errors
///
/// Returns [`AuthError::InvalidClaims`] if `aud` is missing, mistyped or
/// does not match.
pub fn validate_audience(claims: &ClaimSet, expected: &str) -> Result<(), AuthError> {
    let audiences = match claims.audiences() {
        ClaimValue::Present(audiences) => audiences,
        ClaimValue::Absent => return Err(AuthError::invalid_claims("missing audience claim")),
        ClaimValue::WrongType => return Err(AuthError::invalid_claims("invalid audience claim")),
    };

    let stripped: Vec<&str> = audiences
        .iter()
        .map(|aud| aud.strip_prefix(AUDIENCE_PREFIX).unwrap_or(aud))
        .collect();
    if stripped.iter().any(|aud| *aud == expected) {
        return Ok(());
    }

    Err(AuthError::invalid_claims(format!(
        "invalid audience: expected {expected}, got {}",
        stripped.join(", ")
    )))
}

/// Validates `scp` against a required scope.
///
/// The check is substring containment: `scp` must contain `required`
/// somewhere in its text. An empty or absent requirement always passes.
///
/// # Errors
///
/// Returns [`AuthError::InvalidClaims`] if a scope is required and `scp` is
/// missing, mistyped or does not contain it.
pub fn validate_scope(claims: &ClaimSet, required: Option<&str>) -> Result<(), AuthError> {
    let Some(required) = required.filter(|scope| !scope.is_empty()) else {
        return Ok(());
    };

    match claims.scope() {
        ClaimValue::Present(scope) if scope.contains(required) => Ok(()),
        ClaimValue::Present(scope) => Err(AuthError::invalid_claims(format!(
            "insufficient scope: required {required}, got {scope}"
        ))),
        ClaimValue::Absent => Err(AuthError::invalid_claims("missing scope claim")),
        ClaimValue::WrongType => Err(AuthError::invalid_claims("invalid scope claim")),
    }
}

/// Claim rules applied after signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsValidator {
    expected_audience: String,
    required_scope: Option<String>,
    issued_at_leeway: Duration,
}

impl ClaimsValidator {
    /// Creates a validator for `expected_audience` with no scope requirement.
    #[must_use]
    pub fn new(expected_audience: impl Into<String>) -> Self {
        Self {
            expected_audience: expected_audience.into(),
            required_scope: None,
            issued_at_leeway: DEFAULT_ISSUED_AT_LEEWAY,
        }
    }

    /// Requires `scp` to contain `scope`. An empty string clears the requirement.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        self.required_scope = (!scope.is_empty()).then_some(scope);
        self
    }

    /// Overrides the tolerated `iat` clock drift.
    #[must_use]
    pub fn with_issued_at_leeway(mut self, leeway: Duration) -> Self {
        self.issued_at_leeway = leeway;
        self
    }

    /// Expected audience.
    #[must_use]
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Required scope, if any.
    #[must_use]
    pub fn required_scope(&self) -> Option<&str> {
        self.required_scope.as_deref()
    }

    /// Runs the time, audience and scope checks against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError::InvalidClaims`] encountered.
    pub fn validate(&self, claims: &ClaimSet) -> Result<(), AuthError> {
        self.validate_at(claims, Utc::now())
    }

    /// Runs the time, audience and scope checks against `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError::InvalidClaims`] encountered.
    pub fn validate_at(&self, claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), AuthError> {
        validate_time_claims(claims, now, self.issued_at_leeway)?;
        validate_audience(claims, &self.expected_audience)?;
        validate_scope(claims, self.required_scope.as_deref())
    }
}
