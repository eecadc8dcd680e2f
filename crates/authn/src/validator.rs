//! Request validation pipeline.
//!
//! [`TokenValidator`] runs every request through the same ordered stages and
//! stops at the first failure:
//!
//! 1. Extract the bearer token from the `Authorization` header
//!    (`MISSING_TOKEN`).
//! 2. Reject revoked tokens (`TOKEN_REVOKED`). This runs before the cache, so
//!    a revocation takes effect on the very next request.
//! 3. Return cached claims for a token validated recently.
//! 4. Verify the signature (`INVALID_TOKEN`).
//! 5. Apply the claim rules (`INVALID_CLAIMS`).
//! 6. Cache the claims.
//!
//! The validator is `Send + Sync` and is meant to be shared across request
//! handlers behind an [`Arc`].

use std::sync::Arc;

use http::{HeaderMap, Response};
use serde::Serialize;

use crate::{
    cache::ValidationCache,
    claims::ClaimSet,
    config::ValidatorConfig,
    error::{AuthError, ConfigError, ErrorCode},
    extract::{extract_bearer_token, extract_bearer_token_from_headers},
    jwt::SignatureVerifier,
    keys::KeyResolver,
    response::unauthorized_response,
    revocation::RevocationRegistry,
    validation::ClaimsValidator,
};

/// Outcome of validating one request.
///
/// On success `claims` holds the token's claims and `error` is `None`. On
/// failure `claims` is empty and `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Whether the request carried a valid token.
    pub valid: bool,
    /// Claims of the validated token; empty on failure.
    pub claims: ClaimSet,
    /// Failure reason; `None` on success.
    #[serde(skip)]
    pub error: Option<AuthError>,
}

impl ValidationResult {
    /// A successful result carrying `claims`.
    #[must_use]
    pub fn success(claims: ClaimSet) -> Self {
        Self { valid: true, claims, error: None }
    }

    /// A failed result for `error`.
    #[must_use]
    pub fn failure(error: AuthError) -> Self {
        Self { valid: false, claims: ClaimSet::new(), error: Some(error) }
    }

    /// Wire-level error code, if validation failed.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(AuthError::code)
    }

    /// Human-readable failure message; empty on success.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Claims of a successful validation.
    #[must_use]
    pub fn claims(&self) -> Option<&ClaimSet> {
        self.valid.then_some(&self.claims)
    }

    /// User identifier from `sub`, `user_id`, `uid` or `userid`.
    ///
    /// `None` if validation failed or no claim holds a non-empty string.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.claims().and_then(ClaimSet::user_id)
    }

    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure reason if validation failed.
    pub fn into_result(self) -> Result<ClaimSet, AuthError> {
        match self.error {
            None => Ok(self.claims),
            Some(error) => Err(error),
        }
    }
}

impl From<Result<ClaimSet, AuthError>> for ValidationResult {
    fn from(result: Result<ClaimSet, AuthError>) -> Self {
        match result {
            Ok(claims) => Self::success(claims),
            Err(error) => Self::failure(error),
        }
    }
}

/// Something that can turn an `Authorization` header into a validation result.
pub trait Authenticator: Send + Sync {
    /// Validates a raw `Authorization` header value.
    fn authenticate(&self, authorization: Option<&str>) -> ValidationResult;
}

/// Authenticator that accepts every request with an empty claim set.
///
/// For local development and tests of code downstream of authentication.
/// Never deploy it in front of anything that matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAuthenticator;

impl Authenticator for PassthroughAuthenticator {
    fn authenticate(&self, _authorization: Option<&str>) -> ValidationResult {
        ValidationResult::success(ClaimSet::new())
    }
}

/// Validates bearer tokens for one protected resource.
pub struct TokenValidator {
    config: ValidatorConfig,
    verifier: SignatureVerifier,
    claims_validator: ClaimsValidator,
    cache: Arc<ValidationCache>,
    revocations: Arc<RevocationRegistry>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("revocations", &self.revocations.len())
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Creates a validator with its own cache and revocation registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn new(
        config: ValidatorConfig,
        resolver: Arc<dyn KeyResolver>,
    ) -> Result<Self, ConfigError> {
        let cache =
            Arc::new(ValidationCache::with_capacity(config.cache_ttl, config.cache_capacity));
        let revocations =
            Arc::new(RevocationRegistry::with_retention(config.revocation_retention));
        Self::with_state(config, resolver, cache, revocations)
    }

    /// Creates a validator over an existing cache and revocation registry.
    ///
    /// Validators that share a registry observe each other's revocations.
    /// The shared state must have been built with the config's `cache_ttl`,
    /// `cache_capacity` and `revocation_retention`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid, or
    /// [`ConfigError::StateMismatch`] if the cache or registry disagrees with it.
    pub fn with_state(
        config: ValidatorConfig,
        resolver: Arc<dyn KeyResolver>,
        cache: Arc<ValidationCache>,
        revocations: Arc<RevocationRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if cache.ttl() != config.cache_ttl {
            return Err(ConfigError::StateMismatch { setting: "cache_ttl" });
        }
        if cache.capacity() != config.cache_capacity {
            return Err(ConfigError::StateMismatch { setting: "cache_capacity" });
        }
        if revocations.retention() != config.revocation_retention {
            return Err(ConfigError::StateMismatch { setting: "revocation_retention" });
        }

        let mut claims_validator = ClaimsValidator::new(config.client_id.clone())
            .with_issued_at_leeway(config.issued_at_leeway);
        if let Some(scope) = config.scope() {
            claims_validator = claims_validator.with_scope(scope);
        }
        let verifier = SignatureVerifier::new(resolver, config.allowed_algorithms.clone());

        tracing::info!(
            client_id = %config.client_id,
            algorithms = ?config.allowed_algorithms,
            caching = config.caching_enabled(),
            "token validator initialized"
        );

        Ok(Self { config, verifier, claims_validator, cache, revocations })
    }

    /// Validates a request from its raw `Authorization` header value.
    ///
    /// Never panics and never returns an error: every outcome, including a
    /// missing header, is reported through the [`ValidationResult`].
    pub fn validate_request(&self, authorization: Option<&str>) -> ValidationResult {
        let token = authorization.and_then(extract_bearer_token);
        self.validate_extracted(token).into()
    }

    /// Validates a request from its header map.
    pub fn validate_headers(&self, headers: &HeaderMap) -> ValidationResult {
        self.validate_extracted(extract_bearer_token_from_headers(headers)).into()
    }

    /// Validates a bare token, skipping header extraction.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] raised by the pipeline.
    pub fn validate_token(&self, token: &str) -> Result<ClaimSet, AuthError> {
        self.validate_extracted(Some(token).filter(|t| !t.is_empty()))
    }

    #[tracing::instrument(skip_all, fields(token_len = token.map_or(0, str::len)))]
    fn validate_extracted(&self, token: Option<&str>) -> Result<ClaimSet, AuthError> {
        let Some(token) = token else {
            tracing::debug!("no bearer token in request");
            return Err(AuthError::MissingToken);
        };

        if self.revocations.is_revoked(token) {
            tracing::info!("rejected revoked token");
            return Err(AuthError::TokenRevoked);
        }

        if self.config.caching_enabled()
            && let Some(claims) = self.cache.get(token)
        {
            tracing::debug!(cache = "validation", "cache hit");
            return Ok(claims);
        }

        let claims = self.verifier.verify(token)?;
        self.claims_validator.validate(&claims).inspect_err(|e| {
            tracing::debug!(error = %e, "claim validation failed");
        })?;

        if self.config.caching_enabled() {
            self.cache.put(token, claims.clone());
        }
        Ok(claims)
    }

    /// Revokes `token`. Later requests carrying it fail with `TOKEN_REVOKED`
    /// until the revocation ages out.
    pub fn revoke_token(&self, token: &str) {
        self.revocations.revoke(token);
        self.cache.invalidate(token);
    }

    /// Runs `handler` with the validated claims, or returns a 401 response.
    ///
    /// # Errors
    ///
    /// Returns the 401 response to send when validation fails.
    pub fn authorize<T>(
        &self,
        authorization: Option<&str>,
        handler: impl FnOnce(&ClaimSet) -> T,
    ) -> Result<T, Response<String>> {
        let result = self.validate_request(authorization);
        match unauthorized_response(&result) {
            Some(response) => Err(response),
            None => Ok(handler(&result.claims)),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Shared validation cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ValidationCache> {
        &self.cache
    }

    /// Shared revocation registry.
    #[must_use]
    pub fn revocations(&self) -> &Arc<RevocationRegistry> {
        &self.revocations
    }
}

impl Authenticator for TokenValidator {
    fn authenticate(&self, authorization: Option<&str>) -> ValidationResult {
        self.validate_request(authorization)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use chrono::Utc;
    use http::{HeaderValue, StatusCode, header::AUTHORIZATION};
    use jsonwebtoken::Algorithm;
    use serde_json::json;

    use super::*;
    use crate::{
        keys::StaticKeyResolver,
        testutil::{CountingKeyResolver, TestKey, default_claims, rsa_decoding_key, sign_claims},
    };

    fn validator_with(config: ValidatorConfig) -> (TokenValidator, Arc<AtomicUsize>) {
        let resolver = CountingKeyResolver::new(
            StaticKeyResolver::new().with_key("rsa-1", rsa_decoding_key()),
        );
        let calls = resolver.calls();
        (TokenValidator::new(config, Arc::new(resolver)).unwrap(), calls)
    }

    fn validator() -> (TokenValidator, Arc<AtomicUsize>) {
        validator_with(ValidatorConfig::builder().client_id("svc-a").build().unwrap())
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    fn token_for(claims: &ClaimSet) -> String {
        sign_claims(TestKey::Rsa, Algorithm::RS256, "rsa-1", claims)
    }

    #[test]
    fn test_valid_request() {
        let (validator, _) = validator();
        let claims = default_claims("svc-a");
        let result = validator.validate_request(Some(&bearer(&token_for(&claims))));

        assert!(result.valid);
        assert_eq!(result.claims, claims);
        assert_eq!(result.error_code(), None);
        assert_eq!(result.error_message(), "");
        assert_eq!(result.user_id(), Some("user-123"));
    }

    #[test]
    fn test_missing_token() {
        let (validator, _) = validator();
        for header in [None, Some(""), Some("Basic abc"), Some("Bearer"), Some("Bearer a b")] {
            let result = validator.validate_request(header);
            assert!(!result.valid);
            assert!(result.claims.is_empty());
            assert_eq!(result.error_code(), Some(ErrorCode::MissingToken), "{header:?}");
            assert_eq!(result.error_message(), "Authorization header is required");
        }
    }

    #[test]
    fn test_cache_skips_key_resolution() {
        let (validator, calls) = validator();
        let header = bearer(&token_for(&default_claims("svc-a")));

        assert!(validator.validate_request(Some(&header)).valid);
        assert!(validator.validate_request(Some(&header)).valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let config = ValidatorConfig::builder()
            .client_id("svc-a")
            .cache_ttl(Duration::ZERO)
            .build()
            .unwrap();
        let (validator, calls) = validator_with(config);
        let header = bearer(&token_for(&default_claims("svc-a")));

        assert!(validator.validate_request(Some(&header)).valid);
        assert!(validator.validate_request(Some(&header)).valid);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (validator, calls) = validator();
        let header = bearer(&token_for(&default_claims("svc-b")));

        for _ in 0..2 {
            let result = validator.validate_request(Some(&header));
            assert_eq!(result.error_code(), Some(ErrorCode::InvalidClaims));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_revocation_beats_cache() {
        let (validator, _) = validator();
        let token = token_for(&default_claims("svc-a"));
        assert!(validator.validate_request(Some(&bearer(&token))).valid);

        validator.revoke_token(&token);
        let result = validator.validate_request(Some(&bearer(&token)));
        assert_eq!(result.error_code(), Some(ErrorCode::TokenRevoked));
        assert_eq!(result.error_message(), "Token has been revoked");
    }

    #[test]
    fn test_revocation_precedes_signature_check() {
        let (validator, calls) = validator();
        validator.revoke_token("garbage");
        let result = validator.validate_request(Some("Bearer garbage"));
        assert_eq!(result.error_code(), Some(ErrorCode::TokenRevoked));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shared_registry_across_validators() {
        let registry = Arc::new(RevocationRegistry::new());
        let config = ValidatorConfig::builder().client_id("svc-a").build().unwrap();
        let resolver: Arc<dyn KeyResolver> =
            Arc::new(StaticKeyResolver::new().with_key("rsa-1", rsa_decoding_key()));
        let make = || {
            TokenValidator::with_state(
                config.clone(),
                Arc::clone(&resolver),
                Arc::new(ValidationCache::default()),
                Arc::clone(&registry),
            )
            .unwrap()
        };
        let (a, b) = (make(), make());

        let token = token_for(&default_claims("svc-a"));
        a.revoke_token(&token);
        assert_eq!(
            b.validate_request(Some(&bearer(&token))).error_code(),
            Some(ErrorCode::TokenRevoked)
        );
    }

    #[test]
    fn test_shared_state_must_match_config() {
        let config = ValidatorConfig::builder()
            .client_id("svc-a")
            .cache_ttl(Duration::from_millis(50))
            .revocation_retention(Duration::from_millis(50))
            .build()
            .unwrap();
        let counting = CountingKeyResolver::new(
            StaticKeyResolver::new().with_key("rsa-1", rsa_decoding_key()),
        );
        let calls = counting.calls();
        let resolver: Arc<dyn KeyResolver> = Arc::new(counting);
        let build = |cache: ValidationCache, registry: RevocationRegistry| {
            TokenValidator::with_state(
                config.clone(),
                Arc::clone(&resolver),
                Arc::new(cache),
                Arc::new(registry),
            )
        };
        let matching_cache = || ValidationCache::new(Duration::from_millis(50));
        let matching_registry = || RevocationRegistry::with_retention(Duration::from_millis(50));

        assert_eq!(
            build(ValidationCache::default(), matching_registry()).err(),
            Some(ConfigError::StateMismatch { setting: "cache_ttl" })
        );
        assert_eq!(
            build(ValidationCache::with_capacity(Duration::from_millis(50), 5), matching_registry())
                .err(),
            Some(ConfigError::StateMismatch { setting: "cache_capacity" })
        );
        assert_eq!(
            build(matching_cache(), RevocationRegistry::new()).err(),
            Some(ConfigError::StateMismatch { setting: "revocation_retention" })
        );

        // With matching state the configured lifetimes take effect.
        let validator = build(matching_cache(), matching_registry()).unwrap();
        let header = bearer(&token_for(&default_claims("svc-a")));
        assert!(validator.validate_request(Some(&header)).valid);
        validator.revoke_token(header.trim_start_matches("Bearer "));
        assert_eq!(
            validator.validate_request(Some(&header)).error_code(),
            Some(ErrorCode::TokenRevoked)
        );

        thread::sleep(Duration::from_millis(150));

        assert!(validator.validate_request(Some(&header)).valid);
        assert!(validator.revocations().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2, "configured ttl must force re-verification");
    }

    #[test]
    fn test_validate_headers() {
        let (validator, _) = validator();
        let mut headers = HeaderMap::new();
        assert_eq!(
            validator.validate_headers(&headers).error_code(),
            Some(ErrorCode::MissingToken)
        );

        let token = token_for(&default_claims("svc-a"));
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&bearer(&token)).unwrap());
        assert!(validator.validate_headers(&headers).valid);
    }

    #[test]
    fn test_validate_token_directly() {
        let (validator, _) = validator();
        assert_eq!(validator.validate_token(""), Err(AuthError::MissingToken));

        let claims = default_claims("svc-a");
        assert_eq!(validator.validate_token(&token_for(&claims)), Ok(claims));
    }

    #[test]
    fn test_scope_enforced_from_config() {
        let config = ValidatorConfig::builder().client_id("svc-a").scope("admin").build().unwrap();
        let (validator, _) = validator_with(config);

        let header = bearer(&token_for(&default_claims("svc-a")));
        let result = validator.validate_request(Some(&header));
        assert_eq!(result.error_code(), Some(ErrorCode::InvalidClaims));
        assert_eq!(result.error_message(), "insufficient scope: required admin, got read write");
    }

    #[test]
    fn test_user_id_absent_on_failure() {
        let result = ValidationResult::failure(AuthError::MissingToken);
        assert_eq!(result.claims(), None);
        assert_eq!(result.user_id(), None);
    }

    #[test]
    fn test_user_id_fallback_claims() {
        let (validator, _) = validator();
        let now = Utc::now().timestamp();
        let claims = ClaimSet::try_from(json!({
            "aud": "svc-a", "exp": now + 600, "uid": "legacy-7",
        }))
        .unwrap();
        let result = validator.validate_request(Some(&bearer(&token_for(&claims))));
        assert_eq!(result.user_id(), Some("legacy-7"));
    }

    #[test]
    fn test_authorize_runs_handler_on_success() {
        let (validator, _) = validator();
        let header = bearer(&token_for(&default_claims("svc-a")));
        let user = validator
            .authorize(Some(&header), |claims| claims.user_id().map(str::to_owned))
            .unwrap();
        assert_eq!(user.as_deref(), Some("user-123"));
    }

    #[test]
    fn test_authorize_returns_401() {
        let (validator, _) = validator();
        let mut ran = false;
        let response = validator.authorize(None, |_| ran = true).unwrap_err();
        assert!(!ran);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_passthrough_accepts_everything() {
        let result = PassthroughAuthenticator.authenticate(None);
        assert!(result.valid);
        assert!(result.claims.is_empty());
        assert_eq!(result.user_id(), None);
    }

    #[test]
    fn test_authenticator_trait_object() {
        let (validator, _) = validator();
        let authenticators: Vec<Box<dyn Authenticator>> =
            vec![Box::new(validator), Box::new(PassthroughAuthenticator)];
        let outcomes: Vec<bool> =
            authenticators.iter().map(|a| a.authenticate(None).valid).collect();
        assert_eq!(outcomes, vec![false, true]);
    }

    #[test]
    fn test_into_result() {
        let claims = default_claims("svc-a");
        assert_eq!(ValidationResult::success(claims.clone()).into_result(), Ok(claims));
        assert_eq!(
            ValidationResult::failure(AuthError::TokenRevoked).into_result(),
            Err(AuthError::TokenRevoked)
        );
    }
}
