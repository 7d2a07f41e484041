// ABOUTME: The ShareRecordStore interface implemented by the persistence layer.
// ABOUTME: CRUD plus stable, sorted pagination over share records.

use crate::error::ShareError;
use crate::model::{Page, PageRequest, ShareDraft, ShareFilter, ShareRecord};

/// Persistence for share records.
///
/// Implementations must order `list` results by the requested sort and then
/// by `id` ascending, so a given filter and page always return the same rows.
pub trait ShareRecordStore: Send + Sync {
    fn list(&self, filter: &ShareFilter, page: &PageRequest)
    -> Result<Page<ShareRecord>, ShareError>;

    /// Assign an id and timestamps and persist the draft.
    fn create(&self, draft: ShareDraft) -> Result<ShareRecord, ShareError>;

    /// Overwrite the mutable fields of an existing share. `project_id`,
    /// `creator_id`, and `create_time` are kept from the stored row.
    fn update(&self, record: &ShareRecord) -> Result<ShareRecord, ShareError>;

    fn delete(&self, id: &str) -> Result<(), ShareError>;

    fn get(&self, id: &str) -> Result<ShareRecord, ShareError>;
}

/// Reject drafts missing the fields every share needs.
pub fn validate_draft(draft: &ShareDraft) -> Result<(), ShareError> {
    if draft.project_id.trim().is_empty() {
        return Err(ShareError::validation("project_id is required"));
    }
    if draft.name.trim().is_empty() {
        return Err(ShareError::validation("name is required"));
    }
    if let Some(validity) = &draft.validity {
        validity.validate()?;
    }
    Ok(())
}
