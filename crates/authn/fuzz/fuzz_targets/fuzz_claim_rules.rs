//! Structured fuzz target for claim rules and signature verification.
//!
//! Uses the `arbitrary` crate to generate structured JWT-like inputs with
//! claims of any JSON type, assembles them into three-part JWT strings, and
//! feeds them through signature verification. The decoded payload is also
//! run through the claim rules directly, which forged signatures would
//! otherwise never reach.

#![no_main]

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};
use warden_authn::{
    ClaimSet, StaticKeyResolver,
    jwt::verify_signature,
    testutil::rsa_decoding_key,
    validation::{ClaimsValidator, DEFAULT_ALLOWED_ALGORITHMS},
};

/// Structured input representing a fuzzed JWT.
#[derive(Debug, Arbitrary)]
struct FuzzedJwt {
    /// Algorithm string for the header
    alg: FuzzedAlg,
    /// Optional key ID in the header
    kid: Option<String>,
    /// Audience claim
    aud: Option<FuzzedClaim>,
    /// Scope claim
    scp: Option<FuzzedClaim>,
    /// Expiration claim
    exp: Option<FuzzedClaim>,
    /// Issued-at claim
    iat: Option<FuzzedClaim>,
    /// Not-before claim
    nbf: Option<FuzzedClaim>,
    /// Subject claim
    sub: Option<FuzzedClaim>,
    /// Expected audience and required scope
    expected_audience: String,
    required_scope: String,
    /// Seconds since epoch used as "now"
    now: i64,
    /// Extra arbitrary bytes in the signature segment
    signature_bytes: Vec<u8>,
}

/// Fuzzed algorithm values covering known attack vectors and edge cases.
#[derive(Debug, Arbitrary)]
enum FuzzedAlg {
    /// Algorithm substitution attack: "none"
    None,
    /// Symmetric algorithm attack: HS256
    HS256,
    /// Allowed algorithms
    RS256,
    ES256,
    ES384,
    /// Outside the default allow-list
    EdDSA,
    PS256,
    /// Arbitrary string
    Other(String),
}

impl FuzzedAlg {
    fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::HS256 => "HS256",
            Self::RS256 => "RS256",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::EdDSA => "EdDSA",
            Self::PS256 => "PS256",
            Self::Other(s) => s,
        }
    }
}

/// A claim value of any JSON shape.
#[derive(Debug, Arbitrary)]
enum FuzzedClaim {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Strings(Vec<String>),
    Null,
}

impl FuzzedClaim {
    fn to_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::Strings(items) => Value::from(items.clone()),
            Self::Null => Value::Null,
        }
    }
}

fn build_payload(input: &FuzzedJwt) -> Map<String, Value> {
    let mut payload = Map::new();
    for (name, claim) in [
        ("aud", &input.aud),
        ("scp", &input.scp),
        ("exp", &input.exp),
        ("iat", &input.iat),
        ("nbf", &input.nbf),
        ("sub", &input.sub),
    ] {
        if let Some(claim) = claim {
            payload.insert(name.to_owned(), claim.to_value());
        }
    }
    payload
}

fn build_jwt(input: &FuzzedJwt, payload: &Map<String, Value>) -> String {
    let mut header = Map::new();
    header.insert("alg".to_owned(), Value::String(input.alg.as_str().to_owned()));
    if let Some(ref kid) = input.kid {
        header.insert("kid".to_owned(), Value::String(kid.clone()));
    }

    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap_or_default());
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap_or_default());
    let sig_b64 = URL_SAFE_NO_PAD.encode(&input.signature_bytes);

    format!("{header_b64}.{payload_b64}.{sig_b64}")
}

fuzz_target!(|input: FuzzedJwt| {
    let payload = build_payload(&input);
    let token = build_jwt(&input, &payload);

    // Forged signatures must never verify
    let resolver = StaticKeyResolver::new().with_key("rsa-1", rsa_decoding_key());
    assert!(verify_signature(&token, &resolver, DEFAULT_ALLOWED_ALGORITHMS).is_err());

    // Claim rules must be total over any claim shape and any clock
    let Some(now) = DateTime::<Utc>::from_timestamp(input.now, 0) else {
        return;
    };
    let claims = ClaimSet::from(payload);
    let validator = ClaimsValidator::new(input.expected_audience.clone())
        .with_scope(input.required_scope.clone());
    let _ = validator.validate_at(&claims, now);
    let _ = claims.user_id();
});
