// ABOUTME: Renders shared API definitions as a JSON array streamed element by element.

use crate::definition::ApiDefinition;

use super::{DocumentRenderer, ExportContext, RenderError};

/// JSON array renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn header(&self, _ctx: &ExportContext) -> Result<String, RenderError> {
        Ok("[".to_string())
    }

    fn definition(&self, definition: &ApiDefinition, index: usize) -> Result<String, RenderError> {
        let separator = if index == 0 { "\n" } else { ",\n" };
        Ok(format!("{}{}", separator, serde_json::to_string_pretty(definition)?))
    }

    fn footer(&self, ctx: &ExportContext) -> Result<String, RenderError> {
        Ok(if ctx.total == 0 { "]\n" } else { "\n]\n" }.to_string())
    }
}
