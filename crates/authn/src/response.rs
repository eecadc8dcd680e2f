//! HTTP 401 responses for failed validations.
//!
//! The body is a small JSON object and the challenge names the error code:
//!
//! ```text
//! HTTP/1.1 401 Unauthorized
//! Content-Type: application/json
//! WWW-Authenticate: Bearer error="TOKEN_REVOKED"
//!
//! {"code":"TOKEN_REVOKED","error":"Token has been revoked"}
//! ```

use http::{
    HeaderValue, Response, StatusCode,
    header::{CONTENT_TYPE, WWW_AUTHENTICATE},
};

use crate::{
    error::{AuthError, ErrorCode},
    validator::ValidationResult,
};

/// `WWW-Authenticate` challenge for an error code.
#[must_use]
pub fn www_authenticate_challenge(code: ErrorCode) -> HeaderValue {
    HeaderValue::from_static(match code {
        ErrorCode::MissingToken => r#"Bearer error="MISSING_TOKEN""#,
        ErrorCode::TokenRevoked => r#"Bearer error="TOKEN_REVOKED""#,
        ErrorCode::InvalidToken => r#"Bearer error="INVALID_TOKEN""#,
        ErrorCode::InvalidClaims => r#"Bearer error="INVALID_CLAIMS""#,
    })
}

/// Builds the 401 response for `error`.
#[must_use]
pub fn unauthorized_response_for(error: &AuthError) -> Response<String> {
    let code = error.code();
    let body = serde_json::json!({
        "error": error.to_string(),
        "code": code.as_str(),
    });

    let mut response = Response::new(body.to_string());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(WWW_AUTHENTICATE, www_authenticate_challenge(code));
    response
}

/// Builds the 401 response for a failed result, or `None` if it succeeded.
#[must_use]
pub fn unauthorized_response(result: &ValidationResult) -> Option<Response<String>> {
    result.error.as_ref().map(unauthorized_response_for)
}
