//! Shared test utilities for authentication testing.
//!
//! This module provides fixed RSA and P-256 key pairs, Ed25519 key pair
//! generation, helpers for signing claim sets, crafting raw JWT strings (for
//! attack testing) and counting key lookups. It is feature-gated behind
//! `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! warden-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use warden_authn::testutil::{TestKey, default_claims, sign_claims};
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rand_core::OsRng;
use serde_json::json;
use zeroize::Zeroizing;

use crate::{claims::ClaimSet, error::KeyResolutionError, keys::KeyResolver};

/// PKCS#8 PEM of the fixed RSA-2048 test key.
pub const RSA_PRIVATE_PEM: &str = include_str!("../test-keys/rsa_private.pem");
/// SPKI PEM of the fixed RSA-2048 test key.
pub const RSA_PUBLIC_PEM: &str = include_str!("../test-keys/rsa_public.pem");
/// PKCS#8 PEM of the fixed P-256 test key.
pub const EC_P256_PRIVATE_PEM: &str = include_str!("../test-keys/ec_p256_private.pem");
/// SPKI PEM of the fixed P-256 test key.
pub const EC_P256_PUBLIC_PEM: &str = include_str!("../test-keys/ec_p256_public.pem");

/// JWK modulus (`n`) of the fixed RSA test key.
pub const RSA_PUBLIC_JWK_N: &str = "q1qmmIjeFiQjoDbEA50ttqemI7yOfUoV_CCUQYgNLMG_3JcVJAW0u_S1MqQ7lctQ_axqRbRvKYLIbNXZoG4aFdZUPZsFxTDXsaW9H3DGYYoESDhDSfLuVo2IyMKf8UjENgmfFPin4C_1NMHWJ8gOESmNsps27hRNpr0Eh1zwZcYL-jcl7h7XsmS1fqCvtSWBcz4mCRjOsLbj5ZpjFWIe6V4ssu0C8UcTD75pbRNKxHjPDG3DWajQKPXv1EzbifgsYzYaKLG3IqCDb4HvjaSet_UyASQs_LaDW6_r6pD8ryFbfzfMZ4WHO09qtcWkiJmyQB8okD3wPp0df0sJyFttbQ";
/// JWK exponent (`e`) of the fixed RSA test key.
pub const RSA_PUBLIC_JWK_E: &str = "AQAB";

/// Fixed asymmetric test keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKey {
    /// RSA-2048; signs RS* and PS* tokens.
    Rsa,
    /// NIST P-256; signs ES256 tokens.
    EcP256,
}

impl TestKey {
    /// Private key for signing.
    ///
    /// # Panics
    ///
    /// Panics if the embedded PEM is unreadable (should not happen).
    #[must_use]
    pub fn encoding_key(self) -> EncodingKey {
        match self {
            Self::Rsa => {
                EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM.as_bytes()).expect("RSA test key")
            },
            Self::EcP256 => {
                EncodingKey::from_ec_pem(EC_P256_PRIVATE_PEM.as_bytes()).expect("P-256 test key")
            },
        }
    }

    /// Public key for verification.
    #[must_use]
    pub fn decoding_key(self) -> DecodingKey {
        match self {
            Self::Rsa => rsa_decoding_key(),
            Self::EcP256 => ec_decoding_key(),
        }
    }
}

/// Public half of [`TestKey::Rsa`].
///
/// # Panics
///
/// Panics if the embedded PEM is unreadable (should not happen).
#[must_use]
pub fn rsa_decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).expect("RSA test public key")
}

/// Public half of [`TestKey::EcP256`].
///
/// # Panics
///
/// Panics if the embedded PEM is unreadable (should not happen).
#[must_use]
pub fn ec_decoding_key() -> DecodingKey {
    DecodingKey::from_ec_pem(EC_P256_PUBLIC_PEM.as_bytes()).expect("P-256 test public key")
}

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)` where:
/// - `pkcs8_der` is the private key in PKCS#8 DER format wrapped in [`Zeroizing`] (suitable for
///   [`EncodingKey::from_ed_der`])
/// - `public_key_base64url` is the 32-byte public key encoded as base64url without padding
///   (suitable for [`DecodingKey::from_ed_components`])
///
/// Each call generates a fresh random key pair.
pub fn generate_test_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());

    let private_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());
    let mut pkcs8_der = Zeroizing::new(vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER version 0
        0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
    ]);
    pkcs8_der.extend_from_slice(&*private_bytes);

    (pkcs8_der, public_key_b64)
}

/// Builds a [`DecodingKey`] from a base64url Ed25519 public key.
///
/// # Panics
///
/// Panics if the key is not valid base64url.
#[must_use]
pub fn ed25519_decoding_key(public_key_b64: &str) -> DecodingKey {
    DecodingKey::from_ed_components(public_key_b64).expect("Ed25519 test public key")
}

/// A realistic claim set for `audience`, valid for one hour.
///
/// `sub` is `user-123` and `scp` is `read write`.
#[must_use]
pub fn default_claims(audience: &str) -> ClaimSet {
    let now = Utc::now().timestamp();
    ClaimSet::from(
        json!({
            "sub": "user-123",
            "aud": audience,
            "scp": "read write",
            "iat": now,
            "exp": now + 3600,
        })
        .as_object()
        .cloned()
        .unwrap_or_default(),
    )
}

/// Signs `claims` with a fixed test key, setting `kid` in the header.
///
/// # Panics
///
/// Panics if `alg` does not match the key family.
#[must_use]
pub fn sign_claims(key: TestKey, alg: Algorithm, kid: &str, claims: &ClaimSet) -> String {
    let mut header = Header::new(alg);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, claims, &key.encoding_key()).expect("Failed to encode test JWT")
}

/// Signs `claims` with a fixed test key and no `kid` header.
///
/// # Panics
///
/// Panics if `alg` does not match the key family.
#[must_use]
pub fn sign_claims_without_kid(key: TestKey, alg: Algorithm, claims: &ClaimSet) -> String {
    jsonwebtoken::encode(&Header::new(alg), claims, &key.encoding_key())
        .expect("Failed to encode test JWT")
}

/// Signs `claims` with an Ed25519 key in PKCS#8 DER format.
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
#[must_use]
pub fn sign_claims_ed25519(pkcs8_der: &[u8], kid: &str, claims: &ClaimSet) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(pkcs8_der))
        .expect("Failed to encode test JWT")
}

/// Signs `claims` with HMAC-SHA256 over `secret`.
///
/// Used to simulate algorithm confusion, where an attacker signs with a
/// public key's bytes as the HMAC secret.
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
#[must_use]
pub fn sign_claims_hs256(secret: &[u8], kid: &str, claims: &ClaimSet) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Key resolver wrapper that counts lookups.
///
/// Lets tests observe whether a request reached signature verification or
/// was answered earlier (revocation, cache).
#[derive(Debug)]
pub struct CountingKeyResolver<R> {
    inner: R,
    calls: Arc<AtomicUsize>,
}

impl<R: KeyResolver> CountingKeyResolver<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Shared lookup counter.
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl<R: KeyResolver> KeyResolver for CountingKeyResolver<R> {
    fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, KeyResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(kid)
    }
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given [`AuthError`] variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use warden_authn::assert_auth_error;
/// use warden_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenRevoked);
/// assert_auth_error!(result, TokenRevoked);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
