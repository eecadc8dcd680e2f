//! Authentication error types.
//!
//! Every terminal outcome of request validation is an [`AuthError`]. Each
//! variant maps onto exactly one wire-level [`ErrorCode`], which is what the
//! HTTP layer reports in the `WWW-Authenticate` challenge and the JSON body.
//!
//! Errors raised by key resolvers ([`KeyResolutionError`]) and by the JWT
//! library are deliberately folded into [`AuthError::InvalidToken`]: an
//! unverifiable signature is untrusted whatever the cause.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Wire-level error code reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No usable bearer token in the `Authorization` header.
    MissingToken,
    /// The token was explicitly revoked.
    TokenRevoked,
    /// Malformed token, bad signature, disallowed algorithm or unresolvable key.
    InvalidToken,
    /// Expiry, issuance, not-before, audience or scope check failed.
    InvalidClaims,
}

impl ErrorCode {
    /// Returns the code as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidClaims => "INVALID_CLAIMS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication errors produced by the validation pipeline.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No bearer token could be extracted.
    #[error("Authorization header is required")]
    MissingToken,

    /// Token is present in the revocation registry.
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Token structure, signature, algorithm or key could not be trusted.
    #[error("Token validation failed: {message}")]
    InvalidToken {
        /// Human-readable reason.
        message: String,
    },

    /// A claim rule rejected the token.
    #[error("{message}")]
    InvalidClaims {
        /// Human-readable reason, e.g. `token has expired`.
        message: String,
    },
}

impl AuthError {
    /// Creates an [`AuthError::InvalidToken`].
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken { message: message.into() }
    }

    /// Creates an [`AuthError::InvalidClaims`].
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims { message: message.into() }
    }

    /// Returns the wire-level code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MissingToken,
            Self::TokenRevoked => ErrorCode::TokenRevoked,
            Self::InvalidToken { .. } => ErrorCode::InvalidToken,
            Self::InvalidClaims { .. } => ErrorCode::InvalidClaims,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let message = match err.kind() {
            ErrorKind::InvalidToken => "invalid JWT structure".to_owned(),
            ErrorKind::InvalidSignature => "signature mismatch".to_owned(),
            ErrorKind::InvalidAlgorithm => "algorithm not allowed".to_owned(),
            ErrorKind::Base64(_) => "undecodable token segment".to_owned(),
            ErrorKind::Json(_) | ErrorKind::Utf8(_) => "undecodable token body".to_owned(),
            _ => format!("JWT error: {err}"),
        };
        AuthError::InvalidToken { message }
    }
}

impl From<KeyResolutionError> for AuthError {
    fn from(err: KeyResolutionError) -> Self {
        AuthError::InvalidToken { message: err.to_string() }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors returned by a [`KeyResolver`](crate::keys::KeyResolver).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum KeyResolutionError {
    /// The key set has no key with this identifier.
    #[error("Signing key not found: {kid}")]
    UnknownKey {
        /// Key ID that was not found.
        kid: String,
    },

    /// The key source could not be reached.
    #[error("Key source unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// Key material exists but cannot be used for verification.
    #[error("Invalid public key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },
}

impl KeyResolutionError {
    /// Creates a new `UnknownKey` error.
    #[must_use]
    pub fn unknown_key(kid: impl Into<String>) -> Self {
        Self::UnknownKey { kid: kid.into() }
    }

    /// Creates a new `Unavailable` error without a source.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a new `Unavailable` error with a source error.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey { message: message.into() }
    }
}

/// Configuration errors raised while constructing a validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// `client_id` was empty.
    #[error("client ID is required")]
    MissingClientId,

    /// The algorithm allow-list was empty.
    #[error("at least one signature algorithm must be allowed")]
    NoAlgorithms,

    /// The allow-list contained an algorithm that is never accepted.
    #[error("algorithm '{0}' is not allowed for security reasons")]
    ForbiddenAlgorithm(String),

    /// A duration or capacity setting was zero.
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    /// Injected shared state was built with settings other than the config's.
    #[error("{setting} of the shared state does not match the configuration")]
    StateMismatch {
        /// Name of the disagreeing setting.
        setting: &'static str,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::MissingToken.to_string(), "Authorization header is required");
        assert_eq!(AuthError::TokenRevoked.to_string(), "Token has been revoked");
        assert_eq!(
            AuthError::invalid_token("signature mismatch").to_string(),
            "Token validation failed: signature mismatch"
        );
        assert_eq!(AuthError::invalid_claims("token has expired").to_string(), "token has expired");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::MissingToken.code(), ErrorCode::MissingToken);
        assert_eq!(AuthError::TokenRevoked.code(), ErrorCode::TokenRevoked);
        assert_eq!(AuthError::invalid_token("x").code(), ErrorCode::InvalidToken);
        assert_eq!(AuthError::invalid_claims("x").code(), ErrorCode::InvalidClaims);
    }

    #[test]
    fn test_error_code_wire_strings() {
        assert_eq!(ErrorCode::MissingToken.to_string(), "MISSING_TOKEN");
        assert_eq!(ErrorCode::TokenRevoked.to_string(), "TOKEN_REVOKED");
        assert_eq!(ErrorCode::InvalidToken.to_string(), "INVALID_TOKEN");
        assert_eq!(ErrorCode::InvalidClaims.to_string(), "INVALID_CLAIMS");
        assert_eq!(serde_json::to_string(&ErrorCode::InvalidClaims).unwrap(), "\"INVALID_CLAIMS\"");
    }

    #[test]
    fn test_error_from_jsonwebtoken() {
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        let auth_err: AuthError = jwt_err.into();
        assert_eq!(auth_err, AuthError::invalid_token("signature mismatch"));

        // Even time-based library errors collapse into InvalidToken; claim
        // rules are evaluated separately.
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature);
        let auth_err: AuthError = jwt_err.into();
        assert_eq!(auth_err.code(), ErrorCode::InvalidToken);
    }

    #[test]
    fn test_key_resolution_errors_collapse_to_invalid_token() {
        let err: AuthError = KeyResolutionError::unknown_key("kid-1").into();
        assert_eq!(err, AuthError::invalid_token("Signing key not found: kid-1"));

        let err: AuthError = KeyResolutionError::unavailable("connection refused").into();
        assert_eq!(err.code(), ErrorCode::InvalidToken);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_key_resolution_error_preserves_source_chain() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = KeyResolutionError::unavailable_with_source("fetch failed", io);
        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "timed out");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(ConfigError::MissingClientId.to_string(), "client ID is required");
        assert_eq!(
            ConfigError::ForbiddenAlgorithm("HS256".into()).to_string(),
            "algorithm 'HS256' is not allowed for security reasons"
        );
        assert_eq!(
            ConfigError::ZeroValue("cache_ttl").to_string(),
            "cache_ttl must be greater than zero"
        );
        assert_eq!(
            ConfigError::StateMismatch { setting: "cache_ttl" }.to_string(),
            "cache_ttl of the shared state does not match the configuration"
        );
    }
}
