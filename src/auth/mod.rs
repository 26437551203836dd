//! Credential validation.
//!
//! Callers present an opaque bearer key in either `Authorization: Bearer` or
//! `X-API-Key`. The validator resolves it against a digest table built from
//! configuration and yields an immutable [`Principal`] for the rest of the
//! pipeline. Unknown, malformed and expired keys all produce the same
//! caller-facing failure.

mod error;
mod principal;
mod validator;

pub use error::AuthError;
use http::HeaderMap;
pub use principal::{Principal, Role};
pub use validator::CredentialTable;

/// Header carrying an API key directly.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extract the caller's credential from request headers.
///
/// Accepts `Authorization: Bearer <key>` or `X-API-Key: <key>`. Presenting
/// both is rejected as ambiguous so a confused client cannot silently
/// authenticate with the wrong one.
pub fn extract_credential(headers: &HeaderMap) -> Result<String, AuthError> {
    let bearer = headers
        .get(http::header::AUTHORIZATION)
        .map(|v| v.to_str().map_err(|_| AuthError::InvalidCredentials))
        .transpose()?;
    let api_key = headers
        .get(API_KEY_HEADER)
        .map(|v| v.to_str().map_err(|_| AuthError::InvalidCredentials))
        .transpose()?;

    match (bearer, api_key) {
        (Some(_), Some(_)) => Err(AuthError::AmbiguousCredentials),
        (Some(value), None) => {
            let key = value
                .strip_prefix("Bearer ")
                .ok_or(AuthError::InvalidCredentials)?
                .trim();
            if key.is_empty() {
                return Err(AuthError::MissingCredentials);
            }
            Ok(key.to_string())
        }
        (None, Some(value)) => {
            let key = value.trim();
            if key.is_empty() {
                return Err(AuthError::MissingCredentials);
            }
            Ok(key.to_string())
        }
        (None, None) => Err(AuthError::MissingCredentials),
    }
}
