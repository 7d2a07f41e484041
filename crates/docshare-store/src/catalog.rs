// ABOUTME: SQLite definition catalog: modules, definitions, plugin scripts, and protocol lookup.
// ABOUTME: Also accepts catalog seeds so a deployment can load its API corpus from a file.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use docshare_core::collab::{DefinitionCatalog, ProtocolRegistry, ScriptRegistry};
use docshare_core::definition::{ApiDefinition, ApiModule};
use docshare_core::error::ShareError;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Deserialize;

use crate::sqlite::{SqliteError, lock, open_connection};

const DEFINITION_COLUMNS: &str = "id, project_id, module_id, name, protocol, method, path, \
     status, tags, description, request, response, sort_order";

/// A plugin UI script registered for one protocol in one organization.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginScript {
    pub protocol: String,
    pub org_id: String,
    pub script: serde_json::Value,
}

/// A project membership row used by the authorizer.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
}

/// Bulk catalog content, typically parsed from a YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub modules: Vec<ApiModule>,
    pub definitions: Vec<ApiDefinition>,
    pub scripts: Vec<PluginScript>,
    pub members: Vec<ProjectMember>,
}

/// What `SqliteCatalog::import` wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub modules: usize,
    pub definitions: usize,
    pub scripts: usize,
    pub members: usize,
}

/// Raw definition row; JSON columns are decoded outside the row callback.
struct DefinitionRow {
    id: String,
    project_id: String,
    module_id: Option<String>,
    name: String,
    protocol: String,
    method: String,
    path: String,
    status: String,
    tags: String,
    description: Option<String>,
    request: String,
    response: String,
    sort_order: i64,
}

impl DefinitionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            module_id: row.get(2)?,
            name: row.get(3)?,
            protocol: row.get(4)?,
            method: row.get(5)?,
            path: row.get(6)?,
            status: row.get(7)?,
            tags: row.get(8)?,
            description: row.get(9)?,
            request: row.get(10)?,
            response: row.get(11)?,
            sort_order: row.get(12)?,
        })
    }

    fn into_definition(self) -> Result<ApiDefinition, SqliteError> {
        Ok(ApiDefinition {
            id: self.id,
            project_id: self.project_id,
            module_id: self.module_id,
            name: self.name,
            protocol: self.protocol,
            method: self.method,
            path: self.path,
            status: self.status,
            tags: serde_json::from_str(&self.tags)?,
            description: self.description,
            request: serde_json::from_str(&self.request)?,
            response: serde_json::from_str(&self.response)?,
            sort_order: self.sort_order,
        })
    }
}

/// The API definition catalog stored alongside share records.
///
/// Every organization sees `default_protocol`; plugin protocols become
/// visible to an organization once it has a script registered for them.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    default_protocol: String,
}

impl SqliteCatalog {
    pub fn open(path: &Path, default_protocol: impl Into<String>) -> Result<Self, SqliteError> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
            default_protocol: default_protocol.into(),
        })
    }

    pub fn upsert_module(&self, module: &ApiModule) -> Result<(), SqliteError> {
        lock(&self.conn).execute(
            "INSERT INTO api_module (id, project_id, name, parent_id, protocol, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                parent_id = excluded.parent_id,
                protocol = excluded.protocol,
                sort_order = excluded.sort_order",
            params![
                module.id,
                module.project_id,
                module.name,
                module.parent_id,
                module.protocol,
                module.sort_order,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_definition(&self, definition: &ApiDefinition) -> Result<(), SqliteError> {
        lock(&self.conn).execute(
            &format!(
                "INSERT INTO api_definition ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    project_id = excluded.project_id,
                    module_id = excluded.module_id,
                    name = excluded.name,
                    protocol = excluded.protocol,
                    method = excluded.method,
                    path = excluded.path,
                    status = excluded.status,
                    tags = excluded.tags,
                    description = excluded.description,
                    request = excluded.request,
                    response = excluded.response,
                    sort_order = excluded.sort_order",
                DEFINITION_COLUMNS
            ),
            params![
                definition.id,
                definition.project_id,
                definition.module_id,
                definition.name,
                definition.protocol,
                definition.method,
                definition.path,
                definition.status,
                serde_json::to_string(&definition.tags)?,
                definition.description,
                serde_json::to_string(&definition.request)?,
                serde_json::to_string(&definition.response)?,
                definition.sort_order,
            ],
        )?;
        Ok(())
    }

    pub fn put_script(
        &self,
        protocol: &str,
        org_id: &str,
        script: &serde_json::Value,
    ) -> Result<(), SqliteError> {
        lock(&self.conn).execute(
            "INSERT INTO plugin_script (protocol, org_id, script) VALUES (?1, ?2, ?3)
             ON CONFLICT(protocol, org_id) DO UPDATE SET script = excluded.script",
            params![protocol, org_id, serde_json::to_string(script)?],
        )?;
        Ok(())
    }

    pub fn add_member(&self, project_id: &str, user_id: &str) -> Result<(), SqliteError> {
        lock(&self.conn).execute(
            "INSERT OR IGNORE INTO project_member (project_id, user_id) VALUES (?1, ?2)",
            params![project_id, user_id],
        )?;
        Ok(())
    }

    /// Write every row of `seed`, replacing rows with the same key.
    pub fn import(&self, seed: &CatalogSeed) -> Result<ImportSummary, SqliteError> {
        for module in &seed.modules {
            self.upsert_module(module)?;
        }
        for definition in &seed.definitions {
            self.upsert_definition(definition)?;
        }
        for script in &seed.scripts {
            self.put_script(&script.protocol, &script.org_id, &script.script)?;
        }
        for member in &seed.members {
            self.add_member(&member.project_id, &member.user_id)?;
        }
        let summary = ImportSummary {
            modules: seed.modules.len(),
            definitions: seed.definitions.len(),
            scripts: seed.scripts.len(),
            members: seed.members.len(),
        };
        tracing::info!(?summary, "catalog imported");
        Ok(summary)
    }

    fn modules(&self, project_id: &str) -> Result<Vec<ApiModule>, SqliteError> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(
            "SELECT id, project_id, name, parent_id, protocol, sort_order
             FROM api_module WHERE project_id = ?1 ORDER BY sort_order ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(ApiModule {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                parent_id: row.get(3)?,
                protocol: row.get(4)?,
                sort_order: row.get(5)?,
            })
        })?;

        let mut modules = Vec::new();
        for row in rows {
            modules.push(row?);
        }
        Ok(modules)
    }

    fn definitions(
        &self,
        project_id: &str,
        protocols: &BTreeSet<String>,
    ) -> Result<Vec<ApiDefinition>, SqliteError> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_definition WHERE project_id = ?1 AND protocol = ?2
             ORDER BY sort_order ASC, id ASC",
            DEFINITION_COLUMNS
        ))?;

        let mut definitions = Vec::new();
        for protocol in protocols {
            let rows = stmt.query_map(params![project_id, protocol], DefinitionRow::from_row)?;
            for row in rows {
                definitions.push(row?.into_definition()?);
            }
        }
        Ok(definitions)
    }

    fn definition(&self, id: &str) -> Result<Option<ApiDefinition>, SqliteError> {
        let row = lock(&self.conn)
            .query_row(
                &format!("SELECT {} FROM api_definition WHERE id = ?1", DEFINITION_COLUMNS),
                params![id],
                DefinitionRow::from_row,
            )
            .optional()?;
        row.map(DefinitionRow::into_definition).transpose()
    }

    fn plugin_protocols(&self, org_id: &str) -> Result<Vec<String>, SqliteError> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare(
            "SELECT DISTINCT protocol FROM plugin_script WHERE org_id = ?1 ORDER BY protocol",
        )?;
        let rows = stmt.query_map(params![org_id], |row| row.get::<_, String>(0))?;

        let mut protocols = Vec::new();
        for row in rows {
            protocols.push(row?);
        }
        Ok(protocols)
    }

    fn script(&self, protocol: &str, org_id: &str) -> Result<Option<serde_json::Value>, SqliteError> {
        let raw: Option<String> = lock(&self.conn)
            .query_row(
                "SELECT script FROM plugin_script WHERE protocol = ?1 AND org_id = ?2",
                params![protocol, org_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
    }
}

impl DefinitionCatalog for SqliteCatalog {
    fn list_modules(&self, project_id: &str) -> Result<Vec<ApiModule>, ShareError> {
        Ok(self.modules(project_id)?)
    }

    fn list_definitions(
        &self,
        project_id: &str,
        protocols: &BTreeSet<String>,
    ) -> Result<Vec<ApiDefinition>, ShareError> {
        Ok(self.definitions(project_id, protocols)?)
    }

    fn get_definition(&self, id: &str) -> Result<ApiDefinition, ShareError> {
        self.definition(id)?
            .ok_or_else(|| ShareError::not_found("definition", id))
    }
}

impl ProtocolRegistry for SqliteCatalog {
    fn list_protocols(&self, org_id: &str) -> Result<Vec<String>, ShareError> {
        let mut protocols = vec![self.default_protocol.clone()];
        for protocol in self.plugin_protocols(org_id)? {
            if protocol != self.default_protocol {
                protocols.push(protocol);
            }
        }
        Ok(protocols)
    }
}

impl ScriptRegistry for SqliteCatalog {
    fn get_script(&self, definition_id: &str, org_id: &str) -> Result<serde_json::Value, ShareError> {
        let definition = self.get_definition(definition_id)?;
        self.script(&definition.protocol, org_id)?
            .ok_or_else(|| ShareError::not_found("plugin script", definition.protocol))
    }
}
