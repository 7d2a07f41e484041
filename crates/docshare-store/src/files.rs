// ABOUTME: Filesystem ExportFileStore writing exports under <root>/<project_id>/<file_id>.<ext>.
// ABOUTME: Files are written as .part and renamed on commit; a .owner sidecar records who may download.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use docshare_core::collab::{ExportDownload, ExportFile, ExportFileStore};
use docshare_core::error::ShareError;
use docshare_core::export::content_type_for;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Errors that can occur while reading or writing export files.
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("no partial file for {0}")]
    NotStarted(String),
}

impl From<FileStoreError> for ShareError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::InvalidId(id) => ShareError::validation(format!("invalid id: {}", id)),
            other => ShareError::internal(other.to_string()),
        }
    }
}

const PARTIAL_SUFFIX: &str = ".part";
const OWNER_SUFFIX: &str = ".owner";

/// Ids become path components, so only a conservative alphabet is accepted.
fn checked_id(id: &str) -> Result<&str, FileStoreError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(FileStoreError::InvalidId(id.to_string()))
    }
}

/// Export files on local disk.
pub struct FsExportStore {
    root: PathBuf,
    /// Extension of every begun, not yet committed or discarded file.
    pending: Mutex<HashMap<(String, String), String>>,
}

impl FsExportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<(String, String), String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn project_dir(&self, project_id: &str) -> Result<PathBuf, FileStoreError> {
        Ok(self.root.join(checked_id(project_id)?))
    }

    fn final_path(&self, project_id: &str, file_id: &str, extension: &str) -> Result<PathBuf, FileStoreError> {
        Ok(self
            .project_dir(project_id)?
            .join(format!("{}.{}", checked_id(file_id)?, extension)))
    }

    fn partial_path(&self, project_id: &str, file_id: &str, extension: &str) -> Result<PathBuf, FileStoreError> {
        Ok(self.project_dir(project_id)?.join(format!(
            "{}.{}{}",
            checked_id(file_id)?,
            extension,
            PARTIAL_SUFFIX
        )))
    }

    fn owner_path(&self, project_id: &str, file_id: &str) -> Result<PathBuf, FileStoreError> {
        Ok(self
            .project_dir(project_id)?
            .join(format!("{}{}", checked_id(file_id)?, OWNER_SUFFIX)))
    }

    /// Owner recorded when the file was begun, if any.
    async fn recorded_owner(&self, project_id: &str, file_id: &str) -> Result<Option<String>, FileStoreError> {
        match fs::read_to_string(self.owner_path(project_id, file_id)?).await {
            Ok(owner) => Ok(Some(owner)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn pending_extension(&self, project_id: &str, file_id: &str) -> Result<String, FileStoreError> {
        self.pending()
            .get(&(project_id.to_string(), file_id.to_string()))
            .cloned()
            .ok_or_else(|| FileStoreError::NotStarted(file_id.to_string()))
    }

    /// Locate the committed file for `file_id`, whatever its extension.
    async fn find_committed(&self, project_id: &str, file_id: &str) -> Result<Option<PathBuf>, FileStoreError> {
        let dir = self.project_dir(project_id)?;
        let prefix = format!("{}.", checked_id(file_id)?);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix)
                && !name.ends_with(PARTIAL_SUFFIX)
                && !name.ends_with(OWNER_SUFFIX)
            {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    async fn write_chunk(&self, project_id: &str, file_id: &str, chunk: &[u8]) -> Result<(), FileStoreError> {
        let extension = self.pending_extension(project_id, file_id)?;
        let path = self.partial_path(project_id, file_id, &extension)?;
        let mut file = OpenOptions::new().append(true).open(&path).await?;
        file.write_all(chunk).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ExportFileStore for FsExportStore {
    async fn begin(
        &self,
        project_id: &str,
        file_id: &str,
        extension: &str,
        owner_id: &str,
    ) -> Result<(), ShareError> {
        let dir = self.project_dir(project_id)?;
        let path = self.partial_path(project_id, file_id, extension)?;
        let owner = self.owner_path(project_id, file_id)?;
        fs::create_dir_all(&dir).await.map_err(FileStoreError::from)?;
        fs::write(&owner, owner_id).await.map_err(FileStoreError::from)?;
        fs::File::create(&path).await.map_err(FileStoreError::from)?;
        self.pending().insert(
            (project_id.to_string(), file_id.to_string()),
            extension.to_string(),
        );
        tracing::debug!(path = %path.display(), "export file opened");
        Ok(())
    }

    async fn append(&self, project_id: &str, file_id: &str, chunk: &[u8]) -> Result<(), ShareError> {
        Ok(self.write_chunk(project_id, file_id, chunk).await?)
    }

    async fn commit(&self, project_id: &str, file_id: &str) -> Result<ExportFile, ShareError> {
        let extension = self.pending_extension(project_id, file_id)?;
        let partial = self.partial_path(project_id, file_id, &extension)?;
        let target = self.final_path(project_id, file_id, &extension)?;
        fs::rename(&partial, &target)
            .await
            .map_err(FileStoreError::from)?;
        self.pending()
            .remove(&(project_id.to_string(), file_id.to_string()));

        let size = fs::metadata(&target)
            .await
            .map_err(FileStoreError::from)?
            .len();
        Ok(ExportFile {
            project_id: project_id.to_string(),
            file_id: file_id.to_string(),
            file_name: format!("{}.{}", file_id, extension),
            size,
        })
    }

    async fn discard(&self, project_id: &str, file_id: &str) -> Result<(), ShareError> {
        let Some(extension) = self
            .pending()
            .remove(&(project_id.to_string(), file_id.to_string()))
        else {
            return Ok(());
        };
        let partial = self.partial_path(project_id, file_id, &extension)?;
        let owner = self.owner_path(project_id, file_id)?;
        for path in [partial, owner] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(FileStoreError::from(e).into()),
            }
        }
        Ok(())
    }

    async fn open(
        &self,
        project_id: &str,
        file_id: &str,
        owner_id: &str,
    ) -> Result<ExportDownload, ShareError> {
        if checked_id(project_id).is_err() || checked_id(file_id).is_err() {
            return Err(ShareError::not_found("export file", file_id));
        }
        let owner = self.recorded_owner(project_id, file_id).await?;
        if owner.as_deref() != Some(owner_id) {
            return Err(ShareError::not_found("export file", file_id));
        }
        let path = self
            .find_committed(project_id, file_id)
            .await?
            .ok_or_else(|| ShareError::not_found("export file", file_id))?;

        let file = fs::File::open(&path).await.map_err(FileStoreError::from)?;
        let size = file.metadata().await.map_err(FileStoreError::from)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_id.to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ExportDownload {
            file_name,
            content_type: content_type_for(&extension),
            size,
            reader: Box::pin(file),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn committed_file_can_be_downloaded() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        store.begin("project-1", "task-1", "json", "alice").await.unwrap();
        store.append("project-1", "task-1", b"[").await.unwrap();
        store.append("project-1", "task-1", b"]").await.unwrap();

        // Not visible until committed.
        assert!(store.open("project-1", "task-1", "alice").await.unwrap_err().is_not_found());

        let file = store.commit("project-1", "task-1").await.unwrap();
        assert_eq!(file.file_name, "task-1.json");
        assert_eq!(file.size, 2);

        let mut download = store.open("project-1", "task-1", "alice").await.unwrap();
        assert_eq!(download.content_type, "application/json");
        let mut body = String::new();
        download.reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn empty_file_commits() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        store.begin("project-1", "task-1", "md", "alice").await.unwrap();
        let file = store.commit("project-1", "task-1").await.unwrap();
        assert_eq!(file.size, 0);
        assert_eq!(store.open("project-1", "task-1", "alice").await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn discard_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        store.begin("project-1", "task-1", "yaml", "alice").await.unwrap();
        store.append("project-1", "task-1", b"- a").await.unwrap();
        store.discard("project-1", "task-1").await.unwrap();
        store.discard("project-1", "task-1").await.unwrap();

        assert!(!dir.path().join("project-1/task-1.yaml.part").exists());
        assert!(!dir.path().join("project-1/task-1.owner").exists());
        assert!(store.open("project-1", "task-1", "alice").await.unwrap_err().is_not_found());
        assert!(store.append("project-1", "task-1", b"x").await.is_err());
    }

    #[tokio::test]
    async fn files_are_scoped_by_project() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        store.begin("project-1", "task-1", "md", "alice").await.unwrap();
        store.commit("project-1", "task-1").await.unwrap();

        assert!(store.open("project-2", "task-1", "alice").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        let err = store.begin("../etc", "task-1", "md", "alice").await.unwrap_err();
        assert!(matches!(err, ShareError::Validation(_)));
        assert!(store.open("project-1", "../../passwd", "alice").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn foreign_owner_cannot_open_committed_file() {
        let dir = TempDir::new().unwrap();
        let store = FsExportStore::new(dir.path());

        store.begin("project-1", "task-1", "json", "alice").await.unwrap();
        store.append("project-1", "task-1", b"[]").await.unwrap();
        store.commit("project-1", "task-1").await.unwrap();

        assert!(
            store
                .open("project-1", "task-1", "mallory")
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(store.open("project-1", "task-1", "alice").await.unwrap().size, 2);

        // A fresh store over the same directory still knows the owner.
        let reopened = FsExportStore::new(dir.path());
        assert!(
            reopened
                .open("project-1", "task-1", "mallory")
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(
            reopened.open("project-1", "task-1", "alice").await.unwrap().file_name,
            "task-1.json"
        );
    }
}
