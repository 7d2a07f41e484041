// ABOUTME: Module root for export document renderers (Markdown, JSON, YAML).
// ABOUTME: Renderers emit a document piecewise so export jobs can stream and cancel between definitions.

pub mod json;
pub mod markdown;
pub mod yaml;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::definition::ApiDefinition;
use crate::error::ShareError;

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;
pub use yaml::YamlRenderer;

/// Errors that can occur while rendering a document chunk.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("format error: {0}")]
    Fmt(#[from] fmt::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<RenderError> for ShareError {
    fn from(err: RenderError) -> Self {
        ShareError::internal(err.to_string())
    }
}

/// Target document format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
    Yaml,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    pub fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Markdown => Box::new(MarkdownRenderer),
            Self::Json => Box::new(JsonRenderer),
            Self::Yaml => Box::new(YamlRenderer),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ShareError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ShareError::validation(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

/// MIME type served for an export file extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "md" => "text/markdown; charset=utf-8",
        "json" => "application/json",
        "yaml" => "application/yaml",
        _ => "application/octet-stream",
    }
}

/// Document-level facts available to header and footer.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub share_name: String,
    pub project_id: String,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
}

/// Renders one export document as header, one chunk per definition, footer.
/// Concatenating the chunks in order yields the full document.
pub trait DocumentRenderer: Send + Sync {
    fn header(&self, ctx: &ExportContext) -> Result<String, RenderError>;

    fn definition(&self, definition: &ApiDefinition, index: usize) -> Result<String, RenderError>;

    fn footer(&self, ctx: &ExportContext) -> Result<String, RenderError>;
}
