//! JWT signature verification.
//!
//! Verification is deliberately narrow: it proves that a token was signed by
//! the holder of the key named in its header, using an allowed algorithm, and
//! returns the claim set untouched. Time, audience and scope rules run later
//! in [`ClaimsValidator`](crate::validation::ClaimsValidator), so the JWT
//! library's own claim checks are switched off here.

use std::sync::Arc;

use fail::fail_point;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};

use crate::{
    claims::ClaimSet,
    error::AuthError,
    keys::KeyResolver,
    validation::{check_algorithm, validate_kid},
};

/// Decodes a JWT header without verifying anything.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token does not have three
/// segments or the header is not a decodable JWT header. An `alg` the
/// library does not know, such as `none`, fails here.
pub fn decode_jwt_header(token: &str) -> Result<Header, AuthError> {
    if token.split('.').count() != 3 {
        return Err(AuthError::invalid_token("JWT must have 3 parts separated by dots"));
    }
    decode_header(token)
        .map_err(|e| AuthError::invalid_token(format!("failed to decode JWT header: {e}")))
}

/// Verifies a token's signature and returns its claims.
///
/// 1. Decodes the header and checks `alg` against `allowed`.
/// 2. Requires a well-formed `kid` and resolves it through `resolver`.
/// 3. Verifies the signature with the resolved key, pinned to the header
///    algorithm.
///
/// # Errors
///
/// Every failure is an [`AuthError::InvalidToken`]: malformed structure,
/// disallowed algorithm, missing or malformed `kid`, key resolution failure,
/// or signature mismatch.
#[tracing::instrument(skip_all)]
pub fn verify_signature(
    token: &str,
    resolver: &dyn KeyResolver,
    allowed: &[Algorithm],
) -> Result<ClaimSet, AuthError> {
    let header = decode_jwt_header(token)?;

    check_algorithm(header.alg, allowed).inspect_err(|e| {
        tracing::warn!(alg = ?header.alg, error = %e, "rejected token algorithm");
    })?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| AuthError::invalid_token("JWT header missing 'kid' field"))?;
    validate_kid(kid)?;

    fail_point!("verifier-before-key-resolve", |_| {
        Err(AuthError::invalid_token("injected failure before key resolution"))
    });

    let key = resolver.resolve(kid).map_err(|e| {
        tracing::warn!(kid, error = %e, "failed to resolve signing key");
        AuthError::from(e)
    })?;

    let claims = decode::<ClaimSet>(token, &key, &signature_only(header.alg))?.claims;

    tracing::debug!(kid, alg = ?header.alg, "JWT signature verified");
    Ok(claims)
}

/// Library validation settings that check the signature and nothing else.
fn signature_only(alg: Algorithm) -> Validation {
    let mut validation = Validation::new(alg);
    validation.algorithms = vec![alg];
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

/// Signature verifier bound to a resolver and an algorithm allow-list.
#[derive(Clone)]
pub struct SignatureVerifier {
    resolver: Arc<dyn KeyResolver>,
    allowed: Vec<Algorithm>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").field("allowed", &self.allowed).finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(resolver: Arc<dyn KeyResolver>, allowed: Vec<Algorithm>) -> Self {
        Self { resolver, allowed }
    }

    /// Algorithms this verifier accepts.
    #[must_use]
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed
    }

    /// Verifies `token`. See [`verify_signature`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] on any verification failure.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        verify_signature(token, self.resolver.as_ref(), &self.allowed)
    }
}
