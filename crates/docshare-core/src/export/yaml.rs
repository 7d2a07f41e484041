// ABOUTME: Renders shared API definitions as a YAML sequence, one item per chunk.
// ABOUTME: Uses serde_yaml for each item so chunks concatenate into a valid document.

use serde::Serialize;

use crate::definition::ApiDefinition;

use super::{DocumentRenderer, ExportContext, RenderError};

/// YAML sequence renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRenderer;

/// The YAML shape of one exported definition; drops catalog bookkeeping.
#[derive(Debug, Serialize)]
struct YamlDefinition<'a> {
    id: &'a str,
    name: &'a str,
    protocol: &'a str,
    method: &'a str,
    path: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    request: &'a serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    response: &'a serde_json::Value,
}

impl DocumentRenderer for YamlRenderer {
    fn header(&self, _ctx: &ExportContext) -> Result<String, RenderError> {
        Ok(String::new())
    }

    fn definition(&self, definition: &ApiDefinition, _index: usize) -> Result<String, RenderError> {
        let item = YamlDefinition {
            id: &definition.id,
            name: &definition.name,
            protocol: &definition.protocol,
            method: &definition.method,
            path: &definition.path,
            status: &definition.status,
            tags: &definition.tags,
            description: definition.description.as_deref(),
            request: &definition.request,
            response: &definition.response,
        };
        Ok(serde_yaml::to_string(&[item])?)
    }

    fn footer(&self, ctx: &ExportContext) -> Result<String, RenderError> {
        Ok(if ctx.total == 0 { "[]\n" } else { "" }.to_string())
    }
}
