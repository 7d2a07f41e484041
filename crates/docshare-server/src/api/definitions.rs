// ABOUTME: Read-only lookups a share viewer needs to render one definition.

use axum::Json;
use axum::extract::{Path, State};
use docshare_core::ApiDefinition;

use crate::app_state::SharedState;
use crate::error::ApiError;

/// GET /api/doc/share/get-detail/{id}
pub async fn get_detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ApiDefinition>, ApiError> {
    Ok(Json(state.facade.definition_detail(&id)?))
}

/// GET /api/doc/share/plugin/script/{id}/{org_id}
pub async fn plugin_script(
    State(state): State<SharedState>,
    Path((id, org_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.facade.protocol_script(&id, &org_id)?))
}
