//! Signing key resolution.
//!
//! The validator never fetches keys itself. It asks a [`KeyResolver`] for the
//! public key matching a token's `kid` header and treats every failure as an
//! untrusted token. Resolvers must be safe to call from many threads at once;
//! caching, rotation and remote JWKS fetching are their own concern.
//!
//! Any `Fn(&str) -> Result<Arc<DecodingKey>, KeyResolutionError>` closure is a
//! resolver, which keeps ad-hoc lookups and test doubles short:
//!
//! ```
//! use std::sync::Arc;
//!
//! use jsonwebtoken::DecodingKey;
//! use warden_authn::{error::KeyResolutionError, keys::KeyResolver};
//!
//! let resolver = |kid: &str| -> Result<Arc<DecodingKey>, KeyResolutionError> {
//!     Err(KeyResolutionError::unknown_key(kid))
//! };
//! assert!(resolver.resolve("rotated-away").is_err());
//! ```

use std::{collections::HashMap, fmt, sync::Arc};

use jsonwebtoken::{
    DecodingKey,
    jwk::{Jwk, JwkSet},
};

use crate::error::KeyResolutionError;

/// Maps a key identifier to the public key used to verify signatures.
pub trait KeyResolver: Send + Sync {
    /// Returns the verification key for `kid`.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyResolutionError`] if the key is unknown, its source is
    /// unavailable or its material is unusable.
    fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolutionError>;
}

impl<F> KeyResolver for F
where
    F: Fn(&str) -> Result<Arc<DecodingKey>, KeyResolutionError> + Send + Sync,
{
    fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolutionError> {
        self(kid)
    }
}

/// A fixed, in-memory key set.
///
/// Suitable for deployments that pin their issuer's keys in configuration, or
/// that refresh a JWKS document out of band and swap in a new resolver.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, Arc<DecodingKey>>,
}

impl fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("StaticKeyResolver").field("kids", &kids).finish()
    }
}

impl StaticKeyResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key and returns the resolver.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.insert(kid, key);
        self
    }

    /// Adds or replaces the key for `kid`.
    pub fn insert(&mut self, kid: impl Into<String>, key: DecodingKey) {
        self.keys.insert(kid.into(), Arc::new(key));
    }

    /// Removes the key for `kid`, returning whether one was present.
    pub fn remove(&mut self, kid: &str) -> bool {
        self.keys.remove(kid).is_some()
    }

    /// Builds a resolver from a JWK set.
    ///
    /// Keys without a `kid` cannot be selected by a token header and are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError::InvalidKey`] if a keyed entry cannot be
    /// turned into a verification key.
    pub fn from_jwk_set(set: &JwkSet) -> Result<Self, KeyResolutionError> {
        let mut resolver = Self::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::debug!("skipping JWK without kid");
                continue;
            };
            resolver.insert(kid, decoding_key_from_jwk(kid, jwk)?);
        }
        Ok(resolver)
    }

    /// Builds a resolver from a JWKS JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError::InvalidKey`] if the document does not
    /// parse or one of its keys is unusable.
    pub fn from_jwks_json(json: &str) -> Result<Self, KeyResolutionError> {
        let set: JwkSet = serde_json::from_str(json)
            .map_err(|e| KeyResolutionError::invalid_key(format!("malformed JWKS: {e}")))?;
        Self::from_jwk_set(&set)
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyResolver for StaticKeyResolver {
    fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolutionError> {
        self.keys.get(kid).cloned().ok_or_else(|| KeyResolutionError::unknown_key(kid))
    }
}

fn decoding_key_from_jwk(kid: &str, jwk: &Jwk) -> Result<DecodingKey, KeyResolutionError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| KeyResolutionError::invalid_key(format!("JWK '{kid}': {e}")))
}
