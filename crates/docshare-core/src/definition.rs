// ABOUTME: Read-side shapes of the API definition catalog consumed by docshare.
// ABOUTME: Modules group definitions; both carry the protocol used for allow-list filtering.

use serde::{Deserialize, Serialize};

/// A module (folder) grouping API definitions inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiModule {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub protocol: String,
    pub sort_order: i64,
}

/// An API definition as the share viewer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDefinition {
    pub id: String,
    pub project_id: String,
    pub module_id: Option<String>,
    pub name: String,
    pub protocol: String,
    pub method: String,
    pub path: String,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub request: serde_json::Value,
    #[serde(default)]
    pub response: serde_json::Value,
    pub sort_order: i64,
}
