//! Fuzz target for request validation.
//!
//! Feeds arbitrary byte strings as `Authorization` header values through the
//! full validation pipeline. Every input must produce a `ValidationResult`;
//! nothing may panic or hang, and a failed result must carry an error code.

#![no_main]

use std::sync::{Arc, LazyLock};

use libfuzzer_sys::fuzz_target;
use warden_authn::{
    StaticKeyResolver, TokenValidator, ValidatorConfig, extract_bearer_token,
    jwt::decode_jwt_header,
    testutil::{ec_decoding_key, rsa_decoding_key},
    validation::validate_kid,
};

static VALIDATOR: LazyLock<Option<TokenValidator>> = LazyLock::new(|| {
    let resolver = StaticKeyResolver::new()
        .with_key("rsa-1", rsa_decoding_key())
        .with_key("ec-1", ec_decoding_key());
    let config = ValidatorConfig::builder().client_id("svc-a").scope("read").build().ok()?;
    TokenValidator::new(config, Arc::new(resolver)).ok()
});

fuzz_target!(|data: &[u8]| {
    // Header values reaching the validator are always strings
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };
    let Some(validator) = VALIDATOR.as_ref() else {
        return;
    };

    let result = validator.validate_request(Some(header));
    assert_eq!(result.valid, result.error_code().is_none());
    if !result.valid {
        assert!(result.claims.is_empty());
    }

    // Extraction and header decoding on their own must be total as well
    if let Some(token) = extract_bearer_token(header)
        && let Ok(jwt_header) = decode_jwt_header(token)
        && let Some(ref kid) = jwt_header.kid
    {
        let _ = validate_kid(kid);
    }
});
