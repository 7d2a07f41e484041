// ABOUTME: Route definitions for the docshare HTTP API.
// ABOUTME: Management routes sit behind the optional bearer token; viewer routes are open.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::auth::AuthLayer;

/// Prefix every share route is mounted under.
pub const SHARE_PREFIX: &str = "/api/doc/share";

/// Build the complete Axum router. When `auth_token` is set, share
/// management routes (page/add/update/delete) require it as a bearer token.
pub fn create_router(state: SharedState, auth_token: Option<String>) -> Router {
    let mut management = Router::new()
        .route("/page", post(api::shares::page))
        .route("/add", post(api::shares::add))
        .route("/update", post(api::shares::update))
        .route("/delete/{id}", get(api::shares::delete));
    if let Some(token) = auth_token {
        management = management.route_layer(AuthLayer::new(token));
    }

    let viewer = Router::new()
        .route("/check", post(api::shares::check))
        .route("/detail/{id}", get(api::shares::detail))
        .route("/module/tree", post(api::modules::tree))
        .route("/module/count", post(api::modules::count))
        .route("/export/{type}", post(api::export::start))
        .route("/stop/{task_id}", get(api::export::stop))
        .route("/export/status/{task_id}", get(api::export::status))
        .route(
            "/download/file/{project_id}/{file_id}",
            get(api::export::download),
        )
        .route("/get-detail/{id}", get(api::definitions::get_detail))
        .route("/plugin/script/{id}/{org_id}", get(api::definitions::plugin_script));

    Router::new()
        .route("/health", get(health))
        .nest(SHARE_PREFIX, management.merge(viewer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
