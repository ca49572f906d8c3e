use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shelf_common::ShelfError;
use shelf_store::StoreError;
use shelf_web::FetchError;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Set X-API-KEY header.";

/// Errors a handler can return; each maps to one status code and a JSON
/// body of the form `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized. Set X-API-KEY header.")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Invalid(#[from] ShelfError),

    #[error("failed to fetch page: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage failure")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(FetchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Store(err) => tracing::error!(error = %err, "api.store_error"),
            ApiError::Fetch(err) => tracing::warn!(error = %err, "api.fetch_error"),
            other => tracing::debug!(%status, error = %other, "api.rejected"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn statuses() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(ShelfError::InvalidUrl("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ShelfError::InvalidPage("limit".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FetchError::Timeout(Duration::from_secs(1))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(FetchError::ContentType("image/png".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
