// ABOUTME: Extracts the acting user's id from the x-actor-id request header.
// ABOUTME: Operations that act on behalf of a user reject requests without one.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use docshare_core::ShareError;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId(pub String);

impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ActorId(v.to_string()))
            .ok_or_else(|| ApiError(ShareError::validation("missing x-actor-id header")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<ActorId, ApiError> {
        let (mut parts, _) = req.into_parts();
        ActorId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_header() {
        let req = Request::builder()
            .header(ACTOR_HEADER, "alice")
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.unwrap(), ActorId("alice".to_string()));
    }

    #[tokio::test]
    async fn missing_or_blank_header_is_rejected() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(missing).await.unwrap_err().0,
            ShareError::Validation(_)
        ));

        let blank = Request::builder()
            .header(ACTOR_HEADER, "  ")
            .body(())
            .unwrap();
        assert!(extract(blank).await.is_err());
    }
}
