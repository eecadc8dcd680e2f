//! # Warden Authentication
//!
//! Bearer token validation for HTTP services.
//!
//! This crate provides:
//! - **Request validation**: bearer extraction, signature verification against
//!   resolver-supplied keys, and claim rules (expiry, audience, scope)
//! - **Revocation**: explicit, retention-bounded token revocation
//! - **Validation cache**: short-lived reuse of successful validations, never
//!   outliving the token itself
//! - **HTTP integration**: 401 responses with `WWW-Authenticate` challenges
//!
//! ## Security
//!
//! - Only asymmetric algorithms on a configured allow-list are accepted
//! - Symmetric algorithms (HS256, etc.) and `none` are always rejected
//! - Revocation is checked before the cache, so it takes effect immediately
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use jsonwebtoken::DecodingKey;
//! use warden_authn::{StaticKeyResolver, TokenValidator, ValidatorConfig};
//!
//! # fn example(pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let keys = StaticKeyResolver::new().with_key("issuer-key-1", DecodingKey::from_rsa_pem(pem)?);
//! let config =
//!     ValidatorConfig::builder().client_id("billing-api").scope("invoices.read").build()?;
//! let validator = TokenValidator::new(config, Arc::new(keys))?;
//!
//! let result = validator.validate_request(Some("Bearer eyJhbGciOiJSUzI1NiIs..."));
//! if let Some(user) = result.user_id() {
//!     println!("authenticated {user}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Validation cache.
pub mod cache;
/// Claim sets and typed claim access.
pub mod claims;
/// Validator configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Bearer token extraction.
pub mod extract;
/// JWT signature verification.
pub mod jwt;
/// Signing key resolution.
pub mod keys;
/// HTTP 401 responses.
pub mod response;
/// Token revocation.
pub mod revocation;
/// Algorithm policy and claim rules.
pub mod validation;
/// Request validation pipeline.
pub mod validator;

/// Shared test utilities (enabled with the `testutil` feature).
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

// Re-export key types for convenience
pub use cache::ValidationCache;
pub use claims::ClaimSet;
pub use config::ValidatorConfig;
pub use error::{AuthError, ErrorCode, Result};
pub use extract::{extract_bearer_token, extract_bearer_token_from_headers};
pub use keys::{KeyResolver, StaticKeyResolver};
pub use response::unauthorized_response;
pub use revocation::RevocationRegistry;
pub use validation::{DEFAULT_ALLOWED_ALGORITHMS, FORBIDDEN_ALGORITHMS};
pub use validator::{Authenticator, PassthroughAuthenticator, TokenValidator, ValidationResult};
