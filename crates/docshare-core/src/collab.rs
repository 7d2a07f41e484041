// ABOUTME: Narrow interfaces to the collaborators docshare consumes but does not own.
// ABOUTME: Protocol registry, authorization, definition catalog, plugin scripts, audit, export files.

use std::collections::BTreeSet;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::definition::{ApiDefinition, ApiModule};
use crate::error::ShareError;

/// Lists the protocols an organization can see (built-in plus plugin ones).
pub trait ProtocolRegistry: Send + Sync {
    fn list_protocols(&self, org_id: &str) -> Result<Vec<String>, ShareError>;
}

/// Resource kinds an actor may be authorized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Project,
    ApiDocShare,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => f.write_str("project"),
            Self::ApiDocShare => f.write_str("api_doc_share"),
        }
    }
}

/// Decides whether an actor owns a resource. Unknown resources should be
/// reported as `ShareError::NotFound` rather than `Ok(false)`.
pub trait Authorizer: Send + Sync {
    fn authorize(
        &self,
        actor_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool, ShareError>;
}

/// Read access to the API definition store.
pub trait DefinitionCatalog: Send + Sync {
    fn list_modules(&self, project_id: &str) -> Result<Vec<ApiModule>, ShareError>;

    /// Definitions of the project whose protocol is in `protocols`.
    fn list_definitions(
        &self,
        project_id: &str,
        protocols: &BTreeSet<String>,
    ) -> Result<Vec<ApiDefinition>, ShareError>;

    fn get_definition(&self, id: &str) -> Result<ApiDefinition, ShareError>;
}

/// Looks up the plugin UI script rendering a definition's protocol.
pub trait ScriptRegistry: Send + Sync {
    fn get_script(&self, definition_id: &str, org_id: &str) -> Result<serde_json::Value, ShareError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Add,
    Update,
    Delete,
    Export,
    StopExport,
}

/// A successful mutation worth recording in the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor_id: String,
    pub project_id: Option<String>,
    pub resource_id: String,
    pub summary: String,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget sink for audit events. Implementations must not block
/// and must swallow their own delivery failures.
pub trait AuditSink: Send + Sync {
    fn notify(&self, event: AuditEvent);
}

/// A committed export file ready for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub project_id: String,
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
}

/// An open export file handed to the download path.
pub struct ExportDownload {
    pub file_name: String,
    pub content_type: &'static str,
    pub size: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for ExportDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportDownload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish()
    }
}

/// Storage for export results. A file is written in stages: `begin` opens a
/// partial file, `append` extends it, and `commit` publishes it, after which
/// `open` can find it. `discard` removes a partial file.
///
/// The owner recorded at `begin` is kept with the file; `open` reports a
/// file owned by someone else as missing.
#[async_trait]
pub trait ExportFileStore: Send + Sync {
    async fn begin(
        &self,
        project_id: &str,
        file_id: &str,
        extension: &str,
        owner_id: &str,
    ) -> Result<(), ShareError>;

    async fn append(&self, project_id: &str, file_id: &str, chunk: &[u8])
    -> Result<(), ShareError>;

    async fn commit(&self, project_id: &str, file_id: &str) -> Result<ExportFile, ShareError>;

    async fn discard(&self, project_id: &str, file_id: &str) -> Result<(), ShareError>;

    async fn open(
        &self,
        project_id: &str,
        file_id: &str,
        owner_id: &str,
    ) -> Result<ExportDownload, ShareError>;
}
