//! Decoded token claims.
//!
//! A [`ClaimSet`] keeps the token body exactly as decoded: claim values are
//! dynamically typed JSON. Accessors never panic on unexpected shapes; they
//! report a [`ClaimValue`] outcome that distinguishes an absent claim from one
//! of the wrong type, so callers can turn either into a validation failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registered claim names read by the validator.
pub mod names {
    /// Expiration time (seconds since epoch).
    pub const EXP: &str = "exp";
    /// Issued at (seconds since epoch).
    pub const IAT: &str = "iat";
    /// Not before (seconds since epoch).
    pub const NBF: &str = "nbf";
    /// Audience.
    pub const AUD: &str = "aud";
    /// Scope string.
    pub const SCP: &str = "scp";
}

/// Claim names checked, in priority order, when resolving a user identifier.
pub const USER_ID_CLAIMS: &[&str] = &["sub", "user_id", "uid", "userid"];

/// Outcome of a typed claim lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimValue<T> {
    /// The claim is not in the set.
    Absent,
    /// The claim exists but is not of the requested type.
    WrongType,
    /// The claim exists with the requested type.
    Present(T),
}

impl<T> ClaimValue<T> {
    /// Converts into an `Option`, discarding the absent/wrong-type distinction.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::WrongType => None,
        }
    }

    /// Returns `true` if the claim is present with the requested type.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Decoded claim set of a verified token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: Map<String, Value>,
}

impl ClaimSet {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of a claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Returns `true` if the claim is present, whatever its type.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Inserts or replaces a claim.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.claims.insert(name.into(), value.into());
    }

    /// Number of claims in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if the set holds no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Iterates claims in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.claims.iter()
    }

    /// Looks up a string claim.
    #[must_use]
    pub fn get_string(&self, name: &str) -> ClaimValue<&str> {
        match self.claims.get(name) {
            None => ClaimValue::Absent,
            Some(Value::String(s)) => ClaimValue::Present(s.as_str()),
            Some(_) => ClaimValue::WrongType,
        }
    }

    /// Looks up a numeric claim.
    #[must_use]
    pub fn get_number(&self, name: &str) -> ClaimValue<f64> {
        match self.claims.get(name) {
            None => ClaimValue::Absent,
            Some(Value::Number(n)) => n.as_f64().map_or(ClaimValue::WrongType, ClaimValue::Present),
            Some(_) => ClaimValue::WrongType,
        }
    }

    /// Looks up a NumericDate claim as whole seconds since the epoch.
    ///
    /// Fractional seconds are truncated. Values outside the `i64` range
    /// saturate.
    #[must_use]
    pub fn get_timestamp(&self, name: &str) -> ClaimValue<i64> {
        match self.get_number(name) {
            ClaimValue::Present(secs) => ClaimValue::Present(secs as i64),
            ClaimValue::Absent => ClaimValue::Absent,
            ClaimValue::WrongType => ClaimValue::WrongType,
        }
    }

    /// Expiration time (`exp`).
    #[must_use]
    pub fn expires_at(&self) -> ClaimValue<i64> {
        self.get_timestamp(names::EXP)
    }

    /// Issued-at time (`iat`).
    #[must_use]
    pub fn issued_at(&self) -> ClaimValue<i64> {
        self.get_timestamp(names::IAT)
    }

    /// Not-before time (`nbf`).
    #[must_use]
    pub fn not_before(&self) -> ClaimValue<i64> {
        self.get_timestamp(names::NBF)
    }

    /// Audience values (`aud`).
    ///
    /// A single string yields one entry; an array yields its entries and is
    /// treated as the wrong type if any element is not a string.
    #[must_use]
    pub fn audiences(&self) -> ClaimValue<Vec<&str>> {
        match self.claims.get(names::AUD) {
            None => ClaimValue::Absent,
            Some(Value::String(s)) => ClaimValue::Present(vec![s.as_str()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(Value::as_str)
                .collect::<Option<Vec<_>>>()
                .map_or(ClaimValue::WrongType, ClaimValue::Present),
            Some(_) => ClaimValue::WrongType,
        }
    }

    /// Scope string (`scp`).
    #[must_use]
    pub fn scope(&self) -> ClaimValue<&str> {
        self.get_string(names::SCP)
    }

    /// Resolves a user identifier from `sub`, `user_id`, `uid`, `userid`,
    /// returning the first non-empty string in that order.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        USER_ID_CLAIMS.iter().find_map(|name| self.get_string(name).ok().filter(|s| !s.is_empty()))
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self { claims }
    }
}

impl TryFrom<Value> for ClaimSet {
    type Error = Value;

    /// Converts a JSON object; any other JSON value is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(claims) => Ok(Self { claims }),
            other => Err(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> ClaimSet {
        ClaimSet::try_from(value).expect("object")
    }

    #[test]
    fn test_typed_accessors() {
        let set = claims(json!({
            "sub": "user-1",
            "exp": 1_900_000_000u64,
            "iat": 1_800_000_000.75,
            "aud": "api://svc-a",
            "scp": "read write",
        }));

        assert_eq!(set.get_string("sub"), ClaimValue::Present("user-1"));
        assert_eq!(set.expires_at(), ClaimValue::Present(1_900_000_000));
        assert_eq!(set.issued_at(), ClaimValue::Present(1_800_000_000));
        assert_eq!(set.not_before(), ClaimValue::Absent);
        assert_eq!(set.audiences(), ClaimValue::Present(vec!["api://svc-a"]));
        assert_eq!(set.scope(), ClaimValue::Present("read write"));
    }

    #[test]
    fn test_wrong_types_are_reported() {
        let set = claims(json!({
            "exp": "tomorrow",
            "aud": 42,
            "scp": ["read"],
            "sub": {"nested": true},
        }));

        assert_eq!(set.expires_at(), ClaimValue::WrongType);
        assert_eq!(set.audiences(), ClaimValue::WrongType);
        assert_eq!(set.scope(), ClaimValue::WrongType);
        assert_eq!(set.get_string("sub"), ClaimValue::WrongType);
        assert_eq!(set.get_number("sub"), ClaimValue::WrongType);
    }

    #[test]
    fn test_audience_array() {
        let set = claims(json!({"aud": ["svc-a", "svc-b"]}));
        assert_eq!(set.audiences(), ClaimValue::Present(vec!["svc-a", "svc-b"]));

        let set = claims(json!({"aud": ["svc-a", 7]}));
        assert_eq!(set.audiences(), ClaimValue::WrongType);
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        let set = claims(json!({"exp": 1e300, "nbf": -1e300}));
        assert_eq!(set.expires_at(), ClaimValue::Present(i64::MAX));
        assert_eq!(set.not_before(), ClaimValue::Present(i64::MIN));
    }

    #[test]
    fn test_user_id_priority() {
        let set = claims(json!({"sub": "s", "user_id": "u", "uid": "i", "userid": "x"}));
        assert_eq!(set.user_id(), Some("s"));

        let set = claims(json!({"user_id": "u", "uid": "i", "userid": "x"}));
        assert_eq!(set.user_id(), Some("u"));

        let set = claims(json!({"uid": "i", "userid": "x"}));
        assert_eq!(set.user_id(), Some("i"));

        let set = claims(json!({"userid": "x"}));
        assert_eq!(set.user_id(), Some("x"));
    }

    #[test]
    fn test_user_id_skips_empty_and_non_string() {
        let set = claims(json!({"sub": "", "user_id": 12, "uid": "fallback"}));
        assert_eq!(set.user_id(), Some("fallback"));

        let set = claims(json!({"sub": ""}));
        assert_eq!(set.user_id(), None);
        assert_eq!(ClaimSet::new().user_id(), None);
    }

    #[test]
    fn test_try_from_non_object() {
        assert!(ClaimSet::try_from(json!("a string")).is_err());
        assert!(ClaimSet::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let set = claims(json!({"sub": "a", "exp": 1}));
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, json!({"sub": "a", "exp": 1}));
    }
}
