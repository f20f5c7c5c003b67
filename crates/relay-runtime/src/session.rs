//! Session id extraction.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use relay_core::session::{SESSION_HEADER, new_session_id, normalize_session_id};

/// Caller session id from the session header, or a fresh UUID when the
/// header is absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_session_id)
            .unwrap_or_else(new_session_id);
        Ok(Self(id))
    }
}
