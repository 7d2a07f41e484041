// ABOUTME: JSON request bodies accepted by the share API.
// ABOUTME: Field names are snake_case; optional fields default so partial bodies deserialize.

use docshare_core::{InvalidUnit, ShareScope};
use serde::{Deserialize, Serialize};

fn first_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

/// Body of `POST /page`.
#[derive(Debug, Clone, Deserialize)]
pub struct SharePageRequest {
    pub project_id: String,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default = "first_page")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// `"<column> <asc|desc>"`; blank means `create_time desc`.
    #[serde(default)]
    pub sort: Option<String>,
}

/// Body of `POST /add` and `POST /update`. `id` is required for update
/// and ignored for add; `project_id` is required for add and ignored for
/// update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareEditRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub scope: ShareScope,
    /// Plain-text password; absent or empty makes the share public.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub invalid_time: Option<u32>,
    #[serde(default)]
    pub invalid_unit: Option<InvalidUnit>,
    #[serde(default)]
    pub allow_export: bool,
}

/// Body of `POST /check`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareCheckRequest {
    pub doc_share_id: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /module/tree`, `POST /module/count`, and `POST /export/{type}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareModuleRequest {
    pub share_id: String,
    pub project_id: String,
    pub org_id: String,
}

/// Reply of `GET /stop/{task_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReply {
    pub task_id: String,
    pub outcome: String,
}
