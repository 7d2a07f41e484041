// ABOUTME: SQLite-backed ShareRecordStore plus the shared connection and schema setup.
// ABOUTME: Share rows keep scope as JSON and timestamps as fixed-width RFC 3339 text.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use docshare_core::error::ShareError;
use docshare_core::model::{
    InvalidUnit, Page, PageRequest, ShareDraft, ShareFilter, ShareRecord, ShareScope, Validity,
};
use docshare_core::store::{ShareRecordStore, validate_draft};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use ulid::Ulid;

/// Errors that can occur during SQLite store operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Rejected(#[from] ShareError),
}

impl From<SqliteError> for ShareError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Rejected(e) => e,
            other => ShareError::internal(other.to_string()),
        }
    }
}

/// Open (or create) the docshare database and make sure every table exists.
/// Share records, the definition catalog, and project membership share one file.
pub fn open_connection(path: &Path) -> Result<Connection, SqliteError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA busy_timeout=5000;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_doc_share (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            scope TEXT NOT NULL,
            password_hash TEXT,
            invalid_time INTEGER,
            invalid_unit TEXT,
            expires_at TEXT,
            allow_export INTEGER NOT NULL,
            create_user TEXT NOT NULL,
            update_user TEXT NOT NULL,
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_doc_share_project
            ON api_doc_share(project_id);

        CREATE TABLE IF NOT EXISTS api_module (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            parent_id TEXT,
            protocol TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS api_definition (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            module_id TEXT,
            name TEXT NOT NULL,
            protocol TEXT NOT NULL,
            method TEXT NOT NULL,
            path TEXT NOT NULL,
            status TEXT NOT NULL,
            tags TEXT NOT NULL,
            description TEXT,
            request TEXT NOT NULL,
            response TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_definition_project
            ON api_definition(project_id, protocol);

        CREATE TABLE IF NOT EXISTS plugin_script (
            protocol TEXT NOT NULL,
            org_id TEXT NOT NULL,
            script TEXT NOT NULL,
            PRIMARY KEY (protocol, org_id)
        );

        CREATE TABLE IF NOT EXISTS project_member (
            project_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        );",
    )?;

    Ok(conn)
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-width UTC text so lexical order equals chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision the table stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SqliteError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

const SHARE_COLUMNS: &str = "id, project_id, name, scope, password_hash, invalid_time, \
     invalid_unit, expires_at, allow_export, create_user, update_user, create_time, update_time";

/// A share row as stored, before decoding JSON and timestamps.
struct ShareRow {
    id: String,
    project_id: String,
    name: String,
    scope: String,
    password_hash: Option<String>,
    invalid_time: Option<u32>,
    invalid_unit: Option<String>,
    expires_at: Option<String>,
    allow_export: bool,
    create_user: String,
    update_user: String,
    create_time: String,
    update_time: String,
}

impl ShareRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            scope: row.get(3)?,
            password_hash: row.get(4)?,
            invalid_time: row.get(5)?,
            invalid_unit: row.get(6)?,
            expires_at: row.get(7)?,
            allow_export: row.get(8)?,
            create_user: row.get(9)?,
            update_user: row.get(10)?,
            create_time: row.get(11)?,
            update_time: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<ShareRecord, SqliteError> {
        let validity = match (self.invalid_time, self.invalid_unit.as_deref()) {
            (Some(invalid_time), Some(unit)) => Some(Validity {
                invalid_time,
                invalid_unit: InvalidUnit::parse(unit).ok_or_else(|| {
                    SqliteError::Corrupt(format!("share {} has invalid unit {}", self.id, unit))
                })?,
            }),
            _ => None,
        };
        let scope: ShareScope = serde_json::from_str(&self.scope)?;
        Ok(ShareRecord {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            scope,
            password_hash: self.password_hash,
            validity,
            expires_at: self.expires_at.as_deref().map(parse_timestamp).transpose()?,
            allow_export: self.allow_export,
            creator_id: self.create_user,
            update_user: self.update_user,
            create_time: parse_timestamp(&self.create_time)?,
            update_time: parse_timestamp(&self.update_time)?,
        })
    }
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<ShareRecord>, SqliteError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM api_doc_share WHERE id = ?1", SHARE_COLUMNS),
            params![id],
            ShareRow::from_row,
        )
        .optional()?;
    row.map(ShareRow::into_record).transpose()
}

/// Share records persisted in SQLite.
pub struct SqliteShareStore {
    conn: Mutex<Connection>,
}

impl SqliteShareStore {
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    fn list_rows(
        &self,
        filter: &ShareFilter,
        page: &PageRequest,
    ) -> Result<Page<ShareRecord>, SqliteError> {
        let conn = lock(&self.conn);
        let keyword = filter
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);
        let predicate = "project_id = ?1 AND (?2 IS NULL OR instr(lower(name), ?2) > 0)";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM api_doc_share WHERE {}", predicate),
            params![filter.project_id, keyword],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM api_doc_share WHERE {} ORDER BY {} {}, id ASC LIMIT ?3 OFFSET ?4",
            SHARE_COLUMNS,
            predicate,
            page.sort.column.column_name(),
            if page.sort.descending { "DESC" } else { "ASC" },
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.project_id,
                keyword,
                i64::from(page.page_size),
                page.offset() as i64
            ],
            ShareRow::from_row,
        )?;

        let mut list = Vec::new();
        for row in rows {
            list.push(row?.into_record()?);
        }
        Ok(Page {
            current: page.current,
            page_size: page.page_size,
            total: total as u64,
            list,
        })
    }

    fn insert(&self, draft: ShareDraft) -> Result<ShareRecord, SqliteError> {
        let now = now();
        let record = ShareRecord {
            id: Ulid::new().to_string(),
            project_id: draft.project_id,
            name: draft.name,
            scope: draft.scope,
            password_hash: draft.password_hash,
            validity: draft.validity,
            expires_at: draft.validity.map(|v| v.expires_from(now)).transpose()?,
            allow_export: draft.allow_export,
            update_user: draft.creator_id.clone(),
            creator_id: draft.creator_id,
            create_time: now,
            update_time: now,
        };

        lock(&self.conn).execute(
            &format!(
                "INSERT INTO api_doc_share ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                SHARE_COLUMNS
            ),
            params![
                record.id,
                record.project_id,
                record.name,
                serde_json::to_string(&record.scope)?,
                record.password_hash,
                record.validity.map(|v| v.invalid_time),
                record.validity.map(|v| v.invalid_unit.as_str()),
                record.expires_at.map(timestamp),
                record.allow_export,
                record.creator_id,
                record.update_user,
                timestamp(record.create_time),
                timestamp(record.update_time),
            ],
        )?;
        Ok(record)
    }

    fn overwrite(&self, record: &ShareRecord) -> Result<Option<ShareRecord>, SqliteError> {
        let now = now();
        let expires_at = record
            .validity
            .map(|v| v.expires_from(now))
            .transpose()?;
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE api_doc_share SET
                name = ?1,
                scope = ?2,
                password_hash = ?3,
                invalid_time = ?4,
                invalid_unit = ?5,
                expires_at = ?6,
                allow_export = ?7,
                update_user = ?8,
                update_time = ?9
             WHERE id = ?10",
            params![
                record.name,
                serde_json::to_string(&record.scope)?,
                record.password_hash,
                record.validity.map(|v| v.invalid_time),
                record.validity.map(|v| v.invalid_unit.as_str()),
                expires_at.map(timestamp),
                record.allow_export,
                record.update_user,
                timestamp(now),
                record.id,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        fetch(&conn, &record.id)
    }
}

impl ShareRecordStore for SqliteShareStore {
    fn list(&self, filter: &ShareFilter, page: &PageRequest) -> Result<Page<ShareRecord>, ShareError> {
        Ok(self.list_rows(filter, page)?)
    }

    fn create(&self, draft: ShareDraft) -> Result<ShareRecord, ShareError> {
        validate_draft(&draft)?;
        let record = self.insert(draft)?;
        tracing::debug!(share_id = %record.id, project_id = %record.project_id, "share created");
        Ok(record)
    }

    fn update(&self, record: &ShareRecord) -> Result<ShareRecord, ShareError> {
        if record.name.trim().is_empty() {
            return Err(ShareError::validation("name is required"));
        }
        self.overwrite(record)?
            .ok_or_else(|| ShareError::not_found("share", record.id.clone()))
    }

    fn delete(&self, id: &str) -> Result<(), ShareError> {
        let changed = lock(&self.conn)
            .execute("DELETE FROM api_doc_share WHERE id = ?1", params![id])
            .map_err(SqliteError::from)?;
        if changed == 0 {
            return Err(ShareError::not_found("share", id));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<ShareRecord, ShareError> {
        fetch(&lock(&self.conn), id)?.ok_or_else(|| ShareError::not_found("share", id))
    }
}
