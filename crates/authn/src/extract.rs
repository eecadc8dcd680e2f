//! Bearer token extraction from the `Authorization` header.

use http::{HeaderMap, header::AUTHORIZATION};

/// Extracts the bearer token from a raw `Authorization` header value.
///
/// The value must split on whitespace into exactly two parts, the first of
/// which is `bearer` in any letter case. Any other shape yields `None`; an
/// absent token is a normal outcome, not an error.
///
/// # Examples
///
/// ```
/// use warden_authn::extract::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token("Bearer   abc123   "), Some("abc123"));
/// assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
/// assert_eq!(extract_bearer_token("Bearer"), None);
/// assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
/// ```
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// Extracts the bearer token from a request's header map.
///
/// Header values that are not visible ASCII are treated as absent.
#[must_use]
pub fn extract_bearer_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).and_then(extract_bearer_token)
}
