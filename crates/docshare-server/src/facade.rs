// ABOUTME: ShareFacade answers every share operation by composing store, guard, builder, and jobs.
// ABOUTME: Authorizes and validates before mutating, and emits audit events after success.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use docshare_core::export::ExportFormat;
use docshare_core::jobs::{ExportJobManager, ExportRequest, ExportTask, StopOutcome};
use docshare_core::model::{
    Page, PageRequest, ShareDetail, ShareDraft, ShareFilter, ShareRecord, ShareScope,
    ShareSummary, SortOrder, Validity,
};
use docshare_core::password::hash_password;
use docshare_core::tree::{ModuleNode, ModuleTreeBuilder, TreeQuery};
use docshare_core::{
    AccessGuard, ApiDefinition, AuditAction, AuditEvent, AuditSink, Authorizer, DefinitionCatalog,
    ExportDownload, ProtocolRegistry, ResourceType, ScriptRegistry, ShareError, ShareRecordStore,
};

use crate::dto::{ShareCheckRequest, ShareEditRequest, ShareModuleRequest, SharePageRequest};

/// Every collaborator the facade talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ShareRecordStore>,
    pub catalog: Arc<dyn DefinitionCatalog>,
    pub protocols: Arc<dyn ProtocolRegistry>,
    pub scripts: Arc<dyn ScriptRegistry>,
    pub authorizer: Arc<dyn Authorizer>,
    pub audit: Arc<dyn AuditSink>,
    pub jobs: ExportJobManager,
}

/// Entry point for all share operations. Holds no state of its own beyond
/// collaborator handles.
#[derive(Clone)]
pub struct ShareFacade {
    store: Arc<dyn ShareRecordStore>,
    catalog: Arc<dyn DefinitionCatalog>,
    protocols: Arc<dyn ProtocolRegistry>,
    scripts: Arc<dyn ScriptRegistry>,
    authorizer: Arc<dyn Authorizer>,
    audit: Arc<dyn AuditSink>,
    guard: AccessGuard,
    builder: ModuleTreeBuilder,
    jobs: ExportJobManager,
    max_page_size: u32,
}

impl ShareFacade {
    pub fn new(collab: Collaborators, max_page_size: u32) -> Self {
        Self {
            guard: AccessGuard::new(Arc::clone(&collab.store)),
            builder: ModuleTreeBuilder::new(Arc::clone(&collab.catalog)),
            store: collab.store,
            catalog: collab.catalog,
            protocols: collab.protocols,
            scripts: collab.scripts,
            authorizer: collab.authorizer,
            audit: collab.audit,
            jobs: collab.jobs,
            max_page_size,
        }
    }

    pub fn page(
        &self,
        req: &SharePageRequest,
        actor_id: &str,
    ) -> Result<Page<ShareSummary>, ShareError> {
        require("project_id", &req.project_id)?;
        if req.current == 0 {
            return Err(ShareError::validation("current must be at least 1"));
        }
        if req.page_size == 0 || req.page_size > self.max_page_size {
            return Err(ShareError::validation(format!(
                "page_size must be between 1 and {}",
                self.max_page_size
            )));
        }
        let sort = SortOrder::parse(req.sort.as_deref().unwrap_or_default()).ok_or_else(|| {
            ShareError::validation(format!(
                "unsupported sort expression: {}",
                req.sort.as_deref().unwrap_or_default()
            ))
        })?;
        self.authorize(actor_id, ResourceType::Project, &req.project_id)?;

        let filter = ShareFilter {
            project_id: req.project_id.clone(),
            keyword: req.keyword.clone(),
        };
        let page = PageRequest {
            current: req.current,
            page_size: req.page_size,
            sort,
        };
        let now = Utc::now();
        Ok(self.store.list(&filter, &page)?.map(|r| r.summary(now)))
    }

    pub fn add(&self, req: &ShareEditRequest, actor_id: &str) -> Result<ShareSummary, ShareError> {
        require("project_id", &req.project_id)?;
        self.authorize(actor_id, ResourceType::Project, &req.project_id)?;
        let edit = self.validate_edit(req, &req.project_id)?;

        let record = self.store.create(ShareDraft {
            project_id: req.project_id.clone(),
            name: edit.name,
            scope: edit.scope,
            password_hash: edit.password_hash,
            validity: edit.validity,
            allow_export: req.allow_export,
            creator_id: actor_id.to_string(),
        })?;

        self.emit(
            AuditAction::Add,
            actor_id,
            Some(&record.project_id),
            &record.id,
            format!("created share {}", record.name),
        );
        Ok(record.summary(Utc::now()))
    }

    pub fn update(&self, req: &ShareEditRequest, actor_id: &str) -> Result<ShareSummary, ShareError> {
        let id = req
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ShareError::validation("id is required"))?;
        self.authorize(actor_id, ResourceType::ApiDocShare, id)?;
        let existing = self.store.get(id)?;
        let edit = self.validate_edit(req, &existing.project_id)?;

        let record = self.store.update(&ShareRecord {
            name: edit.name,
            scope: edit.scope,
            password_hash: edit.password_hash,
            validity: edit.validity,
            allow_export: req.allow_export,
            update_user: actor_id.to_string(),
            ..existing
        })?;

        self.emit(
            AuditAction::Update,
            actor_id,
            Some(&record.project_id),
            &record.id,
            format!("updated share {}", record.name),
        );
        Ok(record.summary(Utc::now()))
    }

    pub fn delete(&self, id: &str, actor_id: &str) -> Result<(), ShareError> {
        self.authorize(actor_id, ResourceType::ApiDocShare, id)?;
        let existing = self.store.get(id)?;
        self.store.delete(id)?;
        self.emit(
            AuditAction::Delete,
            actor_id,
            Some(&existing.project_id),
            id,
            format!("deleted share {}", existing.name),
        );
        Ok(())
    }

    pub fn check(&self, req: &ShareCheckRequest) -> Result<bool, ShareError> {
        require("doc_share_id", &req.doc_share_id)?;
        self.guard.check_password(&req.doc_share_id, &req.password)
    }

    pub fn detail(&self, id: &str) -> Result<ShareDetail, ShareError> {
        self.guard.detail(id)
    }

    pub fn tree(&self, req: &ShareModuleRequest) -> Result<Vec<ModuleNode>, ShareError> {
        let query = self.tree_query(req)?;
        self.builder.build_tree(&query)
    }

    pub fn tree_count(&self, req: &ShareModuleRequest) -> Result<BTreeMap<String, u64>, ShareError> {
        let query = self.tree_query(req)?;
        self.builder.build_count(&query)
    }

    /// Start an export of the share's visible definitions. Returns the task id.
    pub async fn export(
        &self,
        req: &ShareModuleRequest,
        format: &str,
        actor_id: &str,
    ) -> Result<String, ShareError> {
        let format: ExportFormat = format.parse()?;
        let share = self.readable_share(req)?;
        AccessGuard::ensure_exportable(&share)?;
        let query = self.query_for(&share, &req.org_id)?;
        let definitions = self.builder.select_definitions(&query)?;

        let task_id = self
            .jobs
            .start(
                ExportRequest {
                    project_id: share.project_id.clone(),
                    share_id: share.id.clone(),
                    share_name: share.name.clone(),
                    format,
                    definitions,
                },
                actor_id,
            )
            .await;

        self.emit(
            AuditAction::Export,
            actor_id,
            Some(&share.project_id),
            &share.id,
            format!("started {} export {} of share {}", format, task_id, share.name),
        );
        Ok(task_id)
    }

    pub async fn stop_export(&self, task_id: &str, actor_id: &str) -> Result<StopOutcome, ShareError> {
        let task = self.jobs.status(task_id, actor_id).await?;
        let outcome = self.jobs.stop(task_id, actor_id).await?;
        if outcome == StopOutcome::Requested {
            self.emit(
                AuditAction::StopExport,
                actor_id,
                Some(&task.project_id),
                task_id,
                format!("stopped export of share {}", task.share_id),
            );
        }
        Ok(outcome)
    }

    pub async fn export_status(&self, task_id: &str, actor_id: &str) -> Result<ExportTask, ShareError> {
        self.jobs.status(task_id, actor_id).await
    }

    pub async fn download_file(
        &self,
        project_id: &str,
        file_id: &str,
        actor_id: &str,
    ) -> Result<ExportDownload, ShareError> {
        self.jobs.download(project_id, file_id, actor_id).await
    }

    pub fn definition_detail(&self, id: &str) -> Result<ApiDefinition, ShareError> {
        self.catalog.get_definition(id)
    }

    pub fn protocol_script(&self, id: &str, org_id: &str) -> Result<serde_json::Value, ShareError> {
        self.scripts.get_script(id, org_id)
    }

    fn authorize(
        &self,
        actor_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<(), ShareError> {
        if self.authorizer.authorize(actor_id, resource_type, resource_id)? {
            Ok(())
        } else {
            Err(ShareError::forbidden(format!(
                "{} may not manage {} {}",
                actor_id, resource_type, resource_id
            )))
        }
    }

    fn readable_share(&self, req: &ShareModuleRequest) -> Result<ShareRecord, ShareError> {
        require("share_id", &req.share_id)?;
        let share = self.guard.ensure_readable(&req.share_id)?;
        if share.project_id != req.project_id {
            return Err(ShareError::not_found("share", req.share_id.clone()));
        }
        Ok(share)
    }

    fn tree_query(&self, req: &ShareModuleRequest) -> Result<TreeQuery, ShareError> {
        let share = self.readable_share(req)?;
        self.query_for(&share, &req.org_id)
    }

    fn query_for(&self, share: &ShareRecord, org_id: &str) -> Result<TreeQuery, ShareError> {
        let protocols: BTreeSet<String> = self.protocols.list_protocols(org_id)?.into_iter().collect();
        Ok(TreeQuery {
            project_id: share.project_id.clone(),
            org_id: org_id.to_string(),
            protocols,
            scope: share.scope.clone(),
        })
    }

    fn validate_edit(&self, req: &ShareEditRequest, project_id: &str) -> Result<ValidEdit, ShareError> {
        require("name", &req.name)?;

        let validity = match (req.invalid_time, req.invalid_unit) {
            (None, None) => None,
            (Some(invalid_time), Some(invalid_unit)) => {
                let validity = Validity {
                    invalid_time,
                    invalid_unit,
                };
                validity.validate()?;
                Some(validity)
            }
            _ => {
                return Err(ShareError::validation(
                    "invalid_time and invalid_unit must be given together",
                ));
            }
        };

        if let ShareScope::Modules { module_ids } = &req.scope {
            if module_ids.is_empty() {
                return Err(ShareError::validation("module scope needs at least one module"));
            }
            let known: HashSet<String> = self
                .catalog
                .list_modules(project_id)?
                .into_iter()
                .map(|m| m.id)
                .collect();
            if let Some(missing) = module_ids.iter().find(|id| !known.contains(*id)) {
                return Err(ShareError::validation(format!("unknown module: {}", missing)));
            }
        }

        let password_hash = match req.password.as_deref() {
            Some(plain) if !plain.is_empty() => Some(hash_password(plain)?),
            _ => None,
        };

        Ok(ValidEdit {
            name: req.name.trim().to_string(),
            scope: req.scope.clone(),
            password_hash,
            validity,
        })
    }

    fn emit(
        &self,
        action: AuditAction,
        actor_id: &str,
        project_id: Option<&str>,
        resource_id: &str,
        summary: String,
    ) {
        self.audit.notify(AuditEvent {
            action,
            actor_id: actor_id.to_string(),
            project_id: project_id.map(str::to_string),
            resource_id: resource_id.to_string(),
            summary,
            at: Utc::now(),
        });
    }
}

/// The checked, normalized parts of an add/update body.
struct ValidEdit {
    name: String,
    scope: ShareScope,
    password_hash: Option<String>,
    validity: Option<Validity>,
}

fn require(field: &str, value: &str) -> Result<(), ShareError> {
    if value.trim().is_empty() {
        return Err(ShareError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn stop_outcome_label(outcome: StopOutcome) -> &'static str {
    match outcome {
        StopOutcome::Requested => "requested",
        StopOutcome::AlreadyRequested => "already_requested",
        StopOutcome::AlreadyFinished => "already_finished",
    }
}
