use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// API key middleware for mutating routes.
///
/// Rejects the request with 401 unless the `X-API-KEY` header carries the
/// configured key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let verdict = match request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(key) if keys_match(key.as_bytes(), state.api_key.as_bytes()) => Ok(()),
        Some(_) => Err("mismatch"),
        None => Err("missing"),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            debug!(path = %request.uri().path(), reason, "auth.api_key.rejected");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Comparison whose duration does not depend on where the inputs differ.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_comparison() {
        assert!(keys_match(b"secret", b"secret"));
        assert!(!keys_match(b"secret", b"secreT"));
        assert!(!keys_match(b"secret", b"secret2"));
        assert!(!keys_match(b"", b"secret"));
    }
}
