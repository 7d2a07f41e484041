// ABOUTME: Module tree and per-module count handlers for share viewers.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use docshare_core::ModuleNode;

use crate::app_state::SharedState;
use crate::dto::ShareModuleRequest;
use crate::error::ApiError;

/// POST /api/doc/share/module/tree
pub async fn tree(
    State(state): State<SharedState>,
    Json(req): Json<ShareModuleRequest>,
) -> Result<Json<Vec<ModuleNode>>, ApiError> {
    Ok(Json(state.facade.tree(&req)?))
}

/// POST /api/doc/share/module/count
pub async fn count(
    State(state): State<SharedState>,
    Json(req): Json<ShareModuleRequest>,
) -> Result<Json<BTreeMap<String, u64>>, ApiError> {
    Ok(Json(state.facade.tree_count(&req)?))
}
