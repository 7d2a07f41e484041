// ABOUTME: In-memory stand-ins for docshare's store and collaborators.
// ABOUTME: Used by unit tests here and by the server crate's router tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use ulid::Ulid;

use crate::collab::{
    AuditEvent, AuditSink, Authorizer, DefinitionCatalog, ExportDownload, ExportFile,
    ExportFileStore, ProtocolRegistry, ResourceType, ScriptRegistry,
};
use crate::definition::{ApiDefinition, ApiModule};
use crate::error::ShareError;
use crate::export::content_type_for;
use crate::model::{Page, PageRequest, ShareDraft, ShareFilter, ShareRecord, SortColumn};
use crate::store::{ShareRecordStore, validate_draft};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A ShareRecordStore backed by a HashMap.
#[derive(Debug, Default)]
pub struct InMemoryShareStore {
    records: Mutex<HashMap<String, ShareRecord>>,
}

impl InMemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record verbatim, bypassing timestamp handling.
    pub fn insert(&self, record: ShareRecord) {
        lock(&self.records).insert(record.id.clone(), record);
    }
}

impl ShareRecordStore for InMemoryShareStore {
    fn list(
        &self,
        filter: &ShareFilter,
        page: &PageRequest,
    ) -> Result<Page<ShareRecord>, ShareError> {
        let keyword = filter.keyword.as_deref().map(str::to_lowercase);
        let mut rows: Vec<ShareRecord> = lock(&self.records)
            .values()
            .filter(|r| r.project_id == filter.project_id)
            .filter(|r| {
                keyword
                    .as_deref()
                    .is_none_or(|k| r.name.to_lowercase().contains(k))
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let primary = match page.sort.column {
                SortColumn::CreateTime => a.create_time.cmp(&b.create_time),
                SortColumn::UpdateTime => a.update_time.cmp(&b.update_time),
                SortColumn::Name => a.name.cmp(&b.name),
            };
            let primary = if page.sort.descending {
                primary.reverse()
            } else {
                primary
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });

        let total = rows.len() as u64;
        let list = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok(Page {
            current: page.current,
            page_size: page.page_size,
            total,
            list,
        })
    }

    fn create(&self, draft: ShareDraft) -> Result<ShareRecord, ShareError> {
        validate_draft(&draft)?;
        let now = Utc::now();
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
        self.insert(record.clone());
        Ok(record)
    }

    fn update(&self, record: &ShareRecord) -> Result<ShareRecord, ShareError> {
        let mut records = lock(&self.records);
        let existing = records
            .get_mut(&record.id)
            .ok_or_else(|| ShareError::not_found("share", record.id.clone()))?;
        let now = Utc::now();
        let expires_at = record.validity.map(|v| v.expires_from(now)).transpose()?;
        existing.name = record.name.clone();
        existing.scope = record.scope.clone();
        existing.password_hash = record.password_hash.clone();
        existing.validity = record.validity;
        existing.expires_at = expires_at;
        existing.allow_export = record.allow_export;
        existing.update_user = record.update_user.clone();
        existing.update_time = now;
        Ok(existing.clone())
    }

    fn delete(&self, id: &str) -> Result<(), ShareError> {
        lock(&self.records)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ShareError::not_found("share", id))
    }

    fn get(&self, id: &str) -> Result<ShareRecord, ShareError> {
        lock(&self.records)
            .get(id)
            .cloned()
            .ok_or_else(|| ShareError::not_found("share", id))
    }
}

/// A fixed catalog of modules, definitions, protocols, and plugin scripts.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pub modules: Vec<ApiModule>,
    pub definitions: Vec<ApiDefinition>,
    pub protocols: HashMap<String, Vec<String>>,
    pub scripts: HashMap<(String, String), serde_json::Value>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(
        mut self,
        id: &str,
        parent_id: Option<&str>,
        protocol: &str,
        sort_order: i64,
    ) -> Self {
        self.modules.push(ApiModule {
            id: id.to_string(),
            project_id: "project-1".to_string(),
            name: format!("Module {}", id),
            parent_id: parent_id.map(str::to_string),
            protocol: protocol.to_string(),
            sort_order,
        });
        self
    }

    pub fn definition(mut self, id: &str, module_id: Option<&str>, protocol: &str) -> Self {
        self.definitions.push(sample_definition(id, module_id, protocol));
        self
    }

    pub fn org_protocols(mut self, org_id: &str, protocols: &[&str]) -> Self {
        self.protocols.insert(
            org_id.to_string(),
            protocols.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn script(mut self, protocol: &str, org_id: &str, script: serde_json::Value) -> Self {
        self.scripts
            .insert((protocol.to_string(), org_id.to_string()), script);
        self
    }
}

/// A plain HTTP definition in `project-1`, with a path derived from its id.
pub fn sample_definition(id: &str, module_id: Option<&str>, protocol: &str) -> ApiDefinition {
    ApiDefinition {
        id: id.to_string(),
        project_id: "project-1".to_string(),
        module_id: module_id.map(str::to_string),
        name: format!("Definition {}", id),
        protocol: protocol.to_string(),
        method: "GET".to_string(),
        path: format!("/{}", id),
        status: "PROCESSING".to_string(),
        tags: Vec::new(),
        description: None,
        request: serde_json::Value::Null,
        response: serde_json::Value::Null,
        sort_order: 0,
    }
}

impl DefinitionCatalog for InMemoryCatalog {
    fn list_modules(&self, project_id: &str) -> Result<Vec<ApiModule>, ShareError> {
        Ok(self
            .modules
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    fn list_definitions(
        &self,
        project_id: &str,
        protocols: &BTreeSet<String>,
    ) -> Result<Vec<ApiDefinition>, ShareError> {
        Ok(self
            .definitions
            .iter()
            .filter(|d| d.project_id == project_id && protocols.contains(&d.protocol))
            .cloned()
            .collect())
    }

    fn get_definition(&self, id: &str) -> Result<ApiDefinition, ShareError> {
        self.definitions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ShareError::not_found("definition", id))
    }
}

impl ProtocolRegistry for InMemoryCatalog {
    fn list_protocols(&self, org_id: &str) -> Result<Vec<String>, ShareError> {
        Ok(self.protocols.get(org_id).cloned().unwrap_or_default())
    }
}

impl ScriptRegistry for InMemoryCatalog {
    fn get_script(
        &self,
        definition_id: &str,
        org_id: &str,
    ) -> Result<serde_json::Value, ShareError> {
        let definition = self.get_definition(definition_id)?;
        self.scripts
            .get(&(definition.protocol.clone(), org_id.to_string()))
            .cloned()
            .ok_or_else(|| ShareError::not_found("plugin script", definition.protocol))
    }
}

/// Authorizes actors by an explicit allow set of (actor, resource) pairs.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    allowed: Mutex<HashSet<(String, String)>>,
    allow_all: bool,
}

impl StaticAuthorizer {
    pub fn allow_all() -> Self {
        Self {
            allowed: Mutex::default(),
            allow_all: true,
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor_id: &str, resource_id: &str) {
        lock(&self.allowed).insert((actor_id.to_string(), resource_id.to_string()));
    }
}

impl Authorizer for StaticAuthorizer {
    fn authorize(
        &self,
        actor_id: &str,
        _resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool, ShareError> {
        Ok(self.allow_all
            || lock(&self.allowed).contains(&(actor_id.to_string(), resource_id.to_string())))
    }
}

/// Collects every audit event it is handed.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        lock(&self.events).clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn notify(&self, event: AuditEvent) {
        lock(&self.events).push(event);
    }
}

#[derive(Debug)]
struct MemoryFile {
    extension: String,
    owner_id: String,
    bytes: Vec<u8>,
    committed: bool,
}

/// An ExportFileStore keeping files in memory.
///
/// A gated store makes every `append` wait for a permit released with
/// [`MemoryFileStore::release`], so tests can hold an export mid-flight.
#[derive(Debug)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<(String, String), MemoryFile>>,
    discards: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    fail_after: Option<usize>,
    panic_after: Option<usize>,
    appends: Mutex<usize>,
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self {
            files: Mutex::default(),
            discards: Mutex::default(),
            gate: None,
            fail_after: None,
            panic_after: None,
            appends: Mutex::new(0),
        }
    }
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Fail every append after the first `n` succeed.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Panic on every append after the first `n` succeed.
    pub fn panicking_after(n: usize) -> Self {
        Self {
            panic_after: Some(n),
            ..Self::default()
        }
    }

    /// File ids begun but neither committed nor discarded.
    pub fn partial(&self) -> Vec<String> {
        lock(&self.files)
            .iter()
            .filter(|(_, f)| !f.committed)
            .map(|((_, file_id), _)| file_id.clone())
            .collect()
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Bytes of a committed file.
    pub fn contents(&self, project_id: &str, file_id: &str) -> Option<Vec<u8>> {
        lock(&self.files)
            .get(&(project_id.to_string(), file_id.to_string()))
            .filter(|f| f.committed)
            .map(|f| f.bytes.clone())
    }

    /// File ids that were discarded, in order, one entry per discard.
    pub fn discarded(&self) -> Vec<String> {
        lock(&self.discards).clone()
    }

    fn key(project_id: &str, file_id: &str) -> (String, String) {
        (project_id.to_string(), file_id.to_string())
    }
}

#[async_trait]
impl ExportFileStore for MemoryFileStore {
    async fn begin(
        &self,
        project_id: &str,
        file_id: &str,
        extension: &str,
        owner_id: &str,
    ) -> Result<(), ShareError> {
        lock(&self.files).insert(
            Self::key(project_id, file_id),
            MemoryFile {
                extension: extension.to_string(),
                owner_id: owner_id.to_string(),
                bytes: Vec::new(),
                committed: false,
            },
        );
        Ok(())
    }

    async fn append(
        &self,
        project_id: &str,
        file_id: &str,
        chunk: &[u8],
    ) -> Result<(), ShareError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ShareError::internal(e.to_string()))?
                .forget();
        }
        let appended = *lock(&self.appends);
        if self.panic_after.is_some_and(|n| appended >= n) {
            panic!("append {} on {} exploded", appended, file_id);
        }
        {
            let mut appends = lock(&self.appends);
            if self.fail_after.is_some_and(|n| *appends >= n) {
                return Err(ShareError::internal("disk full"));
            }
            *appends += 1;
        }
        let mut files = lock(&self.files);
        let file = files
            .get_mut(&Self::key(project_id, file_id))
            .ok_or_else(|| ShareError::not_found("export file", file_id))?;
        file.bytes.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(&self, project_id: &str, file_id: &str) -> Result<ExportFile, ShareError> {
        let mut files = lock(&self.files);
        let file = files
            .get_mut(&Self::key(project_id, file_id))
            .ok_or_else(|| ShareError::not_found("export file", file_id))?;
        file.committed = true;
        Ok(ExportFile {
            project_id: project_id.to_string(),
            file_id: file_id.to_string(),
            file_name: format!("{}.{}", file_id, file.extension),
            size: file.bytes.len() as u64,
        })
    }

    async fn discard(&self, project_id: &str, file_id: &str) -> Result<(), ShareError> {
        lock(&self.files).remove(&Self::key(project_id, file_id));
        lock(&self.discards).push(file_id.to_string());
        Ok(())
    }

    async fn open(
        &self,
        project_id: &str,
        file_id: &str,
        owner_id: &str,
    ) -> Result<ExportDownload, ShareError> {
        let files = lock(&self.files);
        let file = files
            .get(&Self::key(project_id, file_id))
            .filter(|f| f.committed && f.owner_id == owner_id)
            .ok_or_else(|| ShareError::not_found("export file", file_id))?;
        Ok(ExportDownload {
            file_name: format!("{}.{}", file_id, file.extension),
            content_type: content_type_for(&file.extension),
            size: file.bytes.len() as u64,
            reader: Box::pin(Cursor::new(file.bytes.clone())),
        })
    }
}
