// ABOUTME: Renders shared API definitions as a Markdown document.
// ABOUTME: One level-2 section per definition; an empty share renders as an empty document.

use std::fmt::Write;

use crate::definition::ApiDefinition;

use super::{DocumentRenderer, ExportContext, RenderError};

/// Markdown document renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn header(&self, ctx: &ExportContext) -> Result<String, RenderError> {
        let mut out = String::new();
        if ctx.total == 0 {
            return Ok(out);
        }
        writeln!(out, "# {}", ctx.share_name)?;
        writeln!(out)?;
        writeln!(
            out,
            "> {} definitions, generated {}",
            ctx.total,
            ctx.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
        )?;
        Ok(out)
    }

    fn definition(&self, definition: &ApiDefinition, _index: usize) -> Result<String, RenderError> {
        let mut out = String::new();
        writeln!(out)?;
        writeln!(out, "## {}", definition.name)?;
        writeln!(out)?;
        writeln!(
            out,
            "`{} {}` ({}, {})",
            definition.method, definition.path, definition.protocol, definition.status
        )?;

        if let Some(ref description) = definition.description {
            writeln!(out)?;
            writeln!(out, "{}", description)?;
        }

        if !definition.tags.is_empty() {
            writeln!(out)?;
            writeln!(out, "Tags: {}", definition.tags.join(", "))?;
        }

        for (title, body) in [("Request", &definition.request), ("Response", &definition.response)] {
            if body.is_null() {
                continue;
            }
            writeln!(out)?;
            writeln!(out, "### {}", title)?;
            writeln!(out)?;
            writeln!(out, "```json")?;
            writeln!(out, "{}", serde_json::to_string_pretty(body)?)?;
            writeln!(out, "```")?;
        }

        Ok(out)
    }

    fn footer(&self, _ctx: &ExportContext) -> Result<String, RenderError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_definition;
    use chrono::Utc;

    fn ctx(total: usize) -> ExportContext {
        ExportContext {
            share_name: "Pets API".to_string(),
            project_id: "project-1".to_string(),
            total,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_export_renders_nothing() {
        let r = MarkdownRenderer;
        assert!(r.header(&ctx(0)).unwrap().is_empty());
        assert!(r.footer(&ctx(0)).unwrap().is_empty());
    }

    #[test]
    fn definition_section_contains_route_and_bodies() {
        let mut def = sample_definition("pets", None, "HTTP");
        def.description = Some("Lists pets.".to_string());
        def.tags = vec!["public".to_string(), "v1".to_string()];
        def.request = serde_json::json!({ "query": { "limit": 10 } });

        let md = MarkdownRenderer.definition(&def, 0).unwrap();
        assert!(md.contains("## Definition pets"));
        assert!(md.contains("`GET /pets` (HTTP, PROCESSING)"));
        assert!(md.contains("Lists pets."));
        assert!(md.contains("Tags: public, v1"));
        assert!(md.contains("### Request"));
        assert!(!md.contains("### Response"));
        assert!(md.contains("\"limit\": 10"));
    }

    #[test]
    fn header_names_share() {
        let header = MarkdownRenderer.header(&ctx(3)).unwrap();
        assert!(header.starts_with("# Pets API\n"));
        assert!(header.contains("3 definitions"));
    }
}
