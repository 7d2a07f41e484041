// ABOUTME: Share management and viewer-gate handlers: page, add, update, delete, check, detail.
// ABOUTME: Management handlers act for the x-actor-id user; check and detail are anonymous.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use docshare_core::{Page, ShareDetail, ShareSummary};

use crate::actor::ActorId;
use crate::app_state::SharedState;
use crate::dto::{ShareCheckRequest, ShareEditRequest, SharePageRequest};
use crate::error::ApiError;

/// POST /api/doc/share/page
pub async fn page(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Json(req): Json<SharePageRequest>,
) -> Result<Json<Page<ShareSummary>>, ApiError> {
    Ok(Json(state.facade.page(&req, &actor)?))
}

/// POST /api/doc/share/add
pub async fn add(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Json(req): Json<ShareEditRequest>,
) -> Result<(StatusCode, Json<ShareSummary>), ApiError> {
    Ok((StatusCode::CREATED, Json(state.facade.add(&req, &actor)?)))
}

/// POST /api/doc/share/update
pub async fn update(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Json(req): Json<ShareEditRequest>,
) -> Result<Json<ShareSummary>, ApiError> {
    Ok(Json(state.facade.update(&req, &actor)?))
}

/// GET /api/doc/share/delete/{id}
pub async fn delete(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.facade.delete(&id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/doc/share/check - true when the password unlocks the share.
pub async fn check(
    State(state): State<SharedState>,
    Json(req): Json<ShareCheckRequest>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(state.facade.check(&req)?))
}

/// GET /api/doc/share/detail/{id}
pub async fn detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ShareDetail>, ApiError> {
    Ok(Json(state.facade.detail(&id)?))
}
