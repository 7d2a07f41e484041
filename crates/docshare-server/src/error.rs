// ABOUTME: Maps ShareError onto HTTP responses with a JSON error body.
// ABOUTME: Internal failures are logged in full and returned as an opaque message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docshare_core::ShareError;

/// Handler error type; wraps every failure a share operation can produce.
#[derive(Debug)]
pub struct ApiError(pub ShareError);

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ShareError::Validation(_) => StatusCode::BAD_REQUEST,
            ShareError::NotFound { .. } => StatusCode::NOT_FOUND,
            ShareError::Forbidden(_) => StatusCode::FORBIDDEN,
            ShareError::Conflict(_) => StatusCode::CONFLICT,
            ShareError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ShareError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn variants_map_to_status_codes() {
        let cases = [
            (ShareError::validation("bad"), StatusCode::BAD_REQUEST),
            (ShareError::not_found("share", "x"), StatusCode::NOT_FOUND),
            (ShareError::forbidden("no"), StatusCode::FORBIDDEN),
            (ShareError::Conflict("race".to_string()), StatusCode::CONFLICT),
            (ShareError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_detail_is_not_returned() {
        let resp = ApiError(ShareError::internal("disk at /var/secret is full")).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal error");
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let resp = ApiError(ShareError::not_found("share", "abc")).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "share not found: abc");
    }
}
