// ABOUTME: AccessGuard decides what an anonymous viewer may read from a share.
// ABOUTME: Password checks, public-safe detail, and expiry/export gates over the share store.

use std::sync::Arc;

use chrono::Utc;

use crate::error::ShareError;
use crate::model::{ShareDetail, ShareRecord};
use crate::password::verify_password;
use crate::store::ShareRecordStore;

/// Gates viewer-facing reads of a share.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn ShareRecordStore>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn ShareRecordStore>) -> Self {
        Self { store }
    }

    /// True when the share is public or `supplied` is its password.
    /// A wrong password is `Ok(false)`; only an unknown share is an error.
    pub fn check_password(&self, id: &str, supplied: &str) -> Result<bool, ShareError> {
        let share = self.store.get(id)?;
        Ok(match share.password_hash.as_deref() {
            None => true,
            Some(stored) => verify_password(stored, supplied),
        })
    }

    pub fn detail(&self, id: &str) -> Result<ShareDetail, ShareError> {
        Ok(self.store.get(id)?.detail(Utc::now()))
    }

    /// Load a share the viewer is about to browse, refusing expired ones.
    pub fn ensure_readable(&self, id: &str) -> Result<ShareRecord, ShareError> {
        let share = self.store.get(id)?;
        if share.is_invalid_at(Utc::now()) {
            return Err(ShareError::forbidden(format!("share {} has expired", id)));
        }
        Ok(share)
    }

    pub fn ensure_exportable(share: &ShareRecord) -> Result<(), ShareError> {
        if !share.allow_export {
            return Err(ShareError::forbidden(format!(
                "share {} does not allow export",
                share.id
            )));
        }
        Ok(())
    }
}
