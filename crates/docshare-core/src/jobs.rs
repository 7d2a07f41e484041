// ABOUTME: ExportJobManager runs share exports as cancellable background tokio tasks.
// ABOUTME: Tracks each task's state, honours cooperative stop requests, and serves finished files.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::collab::{ExportDownload, ExportFileStore};
use crate::definition::ApiDefinition;
use crate::error::ShareError;
use crate::export::{ExportContext, ExportFormat};

/// How long a finished task stays in the registry unless configured otherwise.
pub const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Running,
    Stopped,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Caller-visible state of one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTask {
    pub task_id: String,
    pub owner_id: String,
    pub project_id: String,
    pub share_id: String,
    pub format: ExportFormat,
    pub status: TaskStatus,
    pub processed: usize,
    pub total: usize,
    /// File id to download once Completed. Equal to `task_id`.
    pub result_file: Option<String>,
    /// Failure summary once Failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Everything a worker needs to materialize one export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub project_id: String,
    pub share_id: String,
    pub share_name: String,
    pub format: ExportFormat,
    pub definitions: Vec<ApiDefinition>,
}

/// What a stop call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// This call raised the cancellation flag.
    Requested,
    /// Another call already raised it; nothing changed.
    AlreadyRequested,
    /// The task had already finished; nothing changed.
    AlreadyFinished,
}

/// Registry entry for one task. The worker is the only writer of terminal
/// state; stop callers only touch `cancel`.
struct TaskSlot {
    cancel: AtomicBool,
    task: Mutex<ExportTask>,
}

impl TaskSlot {
    fn lock(&self) -> MutexGuard<'_, ExportTask> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> ExportTask {
        self.lock().clone()
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn advance(&self) {
        self.lock().processed += 1;
    }

    /// Move to a terminal state. Returns false if the task already finished.
    fn finish(&self, status: TaskStatus, result_file: Option<String>, error: Option<String>) -> bool {
        let mut task = self.lock();
        if task.status.is_terminal() {
            return false;
        }
        task.status = status;
        task.result_file = result_file;
        task.error = error;
        task.finished_at = Some(Utc::now());
        true
    }

    /// True once the task finished at least `retention` before `now`.
    fn expired(&self, now: DateTime<Utc>, retention: TimeDelta) -> bool {
        self.lock()
            .finished_at
            .is_some_and(|at| now.signed_duration_since(at) >= retention)
    }
}

enum Outcome {
    Completed,
    Cancelled,
}

/// Owns the lifecycle of export tasks.
///
/// Finished tasks are dropped from the registry once they are older than the
/// retention window; the sweep runs whenever a new export starts. Their files
/// stay downloadable by the owner, since the file store records who owns them.
#[derive(Clone)]
pub struct ExportJobManager {
    tasks: Arc<RwLock<HashMap<String, Arc<TaskSlot>>>>,
    files: Arc<dyn ExportFileStore>,
    retention: TimeDelta,
}

impl ExportJobManager {
    pub fn new(files: Arc<dyn ExportFileStore>) -> Self {
        Self::with_retention(files, DEFAULT_TASK_RETENTION)
    }

    pub fn with_retention(files: Arc<dyn ExportFileStore>, retention: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            files,
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Register a Running task and spawn its worker. Returns the task id
    /// without waiting for any export work.
    pub async fn start(&self, request: ExportRequest, owner_id: &str) -> String {
        let task_id = Ulid::new().to_string();
        let slot = Arc::new(TaskSlot {
            cancel: AtomicBool::new(false),
            task: Mutex::new(ExportTask {
                task_id: task_id.clone(),
                owner_id: owner_id.to_string(),
                project_id: request.project_id.clone(),
                share_id: request.share_id.clone(),
                format: request.format,
                status: TaskStatus::Running,
                processed: 0,
                total: request.definitions.len(),
                result_file: None,
                error: None,
                created_at: Utc::now(),
                finished_at: None,
            }),
        });
        {
            let mut tasks = self.tasks.write().await;
            let now = Utc::now();
            let before = tasks.len();
            tasks.retain(|_, slot| !slot.expired(now, self.retention));
            if tasks.len() < before {
                tracing::debug!(evicted = before - tasks.len(), "expired export tasks evicted");
            }
            tasks.insert(task_id.clone(), Arc::clone(&slot));
        }

        tracing::info!(
            task_id = %task_id,
            share_id = %request.share_id,
            format = %request.format,
            total = request.definitions.len(),
            "export started"
        );

        let project_id = request.project_id.clone();
        let worker = tokio::spawn(run_export(
            Arc::clone(&slot),
            Arc::clone(&self.files),
            task_id.clone(),
            owner_id.to_string(),
            request,
        ));

        // A panicking worker never reaches its own finish call or cleanup;
        // both happen here instead.
        let files = Arc::clone(&self.files);
        let watched_id = task_id.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                tracing::error!(task_id = %watched_id, "export worker aborted: {}", e);
                slot.finish(
                    TaskStatus::Failed,
                    None,
                    Some("export worker aborted".to_string()),
                );
                discard_partial(files.as_ref(), &project_id, &watched_id).await;
            }
        });

        task_id
    }

    /// Ask a running task to stop. Never waits for the worker.
    pub async fn stop(&self, task_id: &str, owner_id: &str) -> Result<StopOutcome, ShareError> {
        let slot = self.slot(task_id).await?;
        {
            let task = slot.lock();
            if task.owner_id != owner_id {
                return Err(ShareError::forbidden(format!(
                    "export task {} belongs to another user",
                    task_id
                )));
            }
            if task.status.is_terminal() {
                return Ok(StopOutcome::AlreadyFinished);
            }
        }

        match slot
            .cancel
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                tracing::info!(task_id = %task_id, "export stop requested");
                Ok(StopOutcome::Requested)
            }
            Err(_) => Ok(StopOutcome::AlreadyRequested),
        }
    }

    pub async fn status(&self, task_id: &str, owner_id: &str) -> Result<ExportTask, ShareError> {
        let task = self.slot(task_id).await?.snapshot();
        if task.owner_id != owner_id {
            return Err(ShareError::forbidden(format!(
                "export task {} belongs to another user",
                task_id
            )));
        }
        Ok(task)
    }

    /// Open a finished export file. Files owned by someone else, or outside
    /// `project_id`, are reported as missing. Works after the task itself
    /// has been evicted.
    pub async fn download(
        &self,
        project_id: &str,
        file_id: &str,
        owner_id: &str,
    ) -> Result<ExportDownload, ShareError> {
        self.files.open(project_id, file_id, owner_id).await
    }

    async fn slot(&self, task_id: &str) -> Result<Arc<TaskSlot>, ShareError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| ShareError::not_found("export task", task_id))
    }
}

async fn run_export(
    slot: Arc<TaskSlot>,
    files: Arc<dyn ExportFileStore>,
    task_id: String,
    owner_id: String,
    request: ExportRequest,
) {
    let project_id = request.project_id.clone();
    let outcome = materialize(&slot, files.as_ref(), &task_id, &owner_id, &request).await;

    let (status, result_file, error) = match outcome {
        Ok(Outcome::Completed) => (TaskStatus::Completed, Some(task_id.clone()), None),
        Ok(Outcome::Cancelled) => {
            discard_partial(files.as_ref(), &project_id, &task_id).await;
            (TaskStatus::Stopped, None, None)
        }
        Err(e) => {
            tracing::error!(task_id = %task_id, "export failed: {}", e);
            discard_partial(files.as_ref(), &project_id, &task_id).await;
            let summary = match e {
                ShareError::Internal(_) => "export failed while writing the document".to_string(),
                other => other.to_string(),
            };
            (TaskStatus::Failed, None, Some(summary))
        }
    };

    if slot.finish(status, result_file, error) {
        let task = slot.snapshot();
        tracing::info!(
            task_id = %task_id,
            status = ?task.status,
            processed = task.processed,
            "export finished"
        );
    }
}

async fn materialize(
    slot: &TaskSlot,
    files: &dyn ExportFileStore,
    task_id: &str,
    owner_id: &str,
    request: &ExportRequest,
) -> Result<Outcome, ShareError> {
    let renderer = request.format.renderer();
    let ctx = ExportContext {
        share_name: request.share_name.clone(),
        project_id: request.project_id.clone(),
        total: request.definitions.len(),
        generated_at: Utc::now(),
    };
    let project_id = request.project_id.as_str();

    files
        .begin(project_id, task_id, request.format.extension(), owner_id)
        .await?;
    append(files, project_id, task_id, renderer.header(&ctx)?).await?;

    for (index, definition) in request.definitions.iter().enumerate() {
        if slot.cancel_requested() {
            return Ok(Outcome::Cancelled);
        }
        append(files, project_id, task_id, renderer.definition(definition, index)?).await?;
        slot.advance();
        tokio::task::yield_now().await;
    }

    append(files, project_id, task_id, renderer.footer(&ctx)?).await?;
    files.commit(project_id, task_id).await?;
    Ok(Outcome::Completed)
}

async fn append(
    files: &dyn ExportFileStore,
    project_id: &str,
    task_id: &str,
    chunk: String,
) -> Result<(), ShareError> {
    if chunk.is_empty() {
        return Ok(());
    }
    files.append(project_id, task_id, chunk.as_bytes()).await
}

async fn discard_partial(files: &dyn ExportFileStore, project_id: &str, task_id: &str) {
    if let Err(e) = files.discard(project_id, task_id).await {
        tracing::warn!(task_id = %task_id, "failed to discard partial export: {}", e);
    }
}
