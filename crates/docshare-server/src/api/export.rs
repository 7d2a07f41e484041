// ABOUTME: Export task handlers: start, stop, status, and streamed download of the result file.
// ABOUTME: All of them act for the x-actor-id user, who owns the tasks they start.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use docshare_core::ExportTask;
use tokio_util::io::ReaderStream;

use crate::actor::ActorId;
use crate::app_state::SharedState;
use crate::dto::{ShareModuleRequest, StopReply};
use crate::error::ApiError;
use crate::facade::stop_outcome_label;

/// POST /api/doc/share/export/{type} - returns the new task id.
pub async fn start(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Path(format): Path<String>,
    Json(req): Json<ShareModuleRequest>,
) -> Result<(StatusCode, Json<String>), ApiError> {
    let task_id = state.facade.export(&req, &format, &actor).await?;
    Ok((StatusCode::ACCEPTED, Json(task_id)))
}

/// GET /api/doc/share/stop/{task_id}
pub async fn stop(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Path(task_id): Path<String>,
) -> Result<Json<StopReply>, ApiError> {
    let outcome = state.facade.stop_export(&task_id, &actor).await?;
    Ok(Json(StopReply {
        task_id,
        outcome: stop_outcome_label(outcome).to_string(),
    }))
}

/// GET /api/doc/share/export/status/{task_id}
pub async fn status(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Path(task_id): Path<String>,
) -> Result<Json<ExportTask>, ApiError> {
    Ok(Json(state.facade.export_status(&task_id, &actor).await?))
}

/// GET /api/doc/share/download/file/{project_id}/{file_id}
pub async fn download(
    State(state): State<SharedState>,
    ActorId(actor): ActorId,
    Path((project_id, file_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let file = state
        .facade
        .download_file(&project_id, &file_id, &actor)
        .await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let body = Body::from_stream(ReaderStream::new(file.reader));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(file.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(file.size)),
        ],
        body,
    )
        .into_response())
}
