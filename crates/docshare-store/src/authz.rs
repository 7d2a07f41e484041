// ABOUTME: Project-membership Authorizer backed by the docshare SQLite database.
// ABOUTME: Shares are authorized through the project they belong to.

use std::path::Path;
use std::sync::Mutex;

use docshare_core::collab::{Authorizer, ResourceType};
use docshare_core::error::ShareError;
use rusqlite::{Connection, OptionalExtension, params};

use crate::sqlite::{SqliteError, lock, open_connection};

/// Grants access to members of the owning project.
pub struct MemberAuthorizer {
    conn: Mutex<Connection>,
}

impl MemberAuthorizer {
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    fn is_member(conn: &Connection, project_id: &str, actor_id: &str) -> Result<bool, SqliteError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM project_member WHERE project_id = ?1 AND user_id = ?2",
                params![project_id, actor_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn share_project(conn: &Connection, share_id: &str) -> Result<Option<String>, SqliteError> {
        Ok(conn
            .query_row(
                "SELECT project_id FROM api_doc_share WHERE id = ?1",
                params![share_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl Authorizer for MemberAuthorizer {
    fn authorize(
        &self,
        actor_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool, ShareError> {
        let conn = lock(&self.conn);
        let project_id = match resource_type {
            ResourceType::Project => resource_id.to_string(),
            ResourceType::ApiDocShare => Self::share_project(&conn, resource_id)?
                .ok_or_else(|| ShareError::not_found("share", resource_id))?,
        };
        let allowed = Self::is_member(&conn, &project_id, actor_id)?;
        if !allowed {
            tracing::debug!(
                actor_id = %actor_id,
                resource = %resource_type,
                resource_id = %resource_id,
                "authorization denied"
            );
        }
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::sqlite::SqliteShareStore;
    use docshare_core::model::{ShareDraft, ShareScope};
    use docshare_core::store::ShareRecordStore;
    use tempfile::TempDir;

    #[test]
    fn members_are_authorized_for_project_and_its_shares() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docshare.db");
        let catalog = SqliteCatalog::open(&path, "HTTP").unwrap();
        let shares = SqliteShareStore::open(&path).unwrap();
        let authz = MemberAuthorizer::open(&path).unwrap();

        catalog.add_member("project-1", "alice").unwrap();
        let share = shares
            .create(ShareDraft {
                project_id: "project-1".to_string(),
                name: "Pets".to_string(),
                scope: ShareScope::All,
                password_hash: None,
                validity: None,
                allow_export: false,
                creator_id: "alice".to_string(),
            })
            .unwrap();

        assert!(authz.authorize("alice", ResourceType::Project, "project-1").unwrap());
        assert!(!authz.authorize("bob", ResourceType::Project, "project-1").unwrap());
        assert!(authz.authorize("alice", ResourceType::ApiDocShare, &share.id).unwrap());
        assert!(!authz.authorize("bob", ResourceType::ApiDocShare, &share.id).unwrap());
    }

    #[test]
    fn unknown_share_is_not_found() {
        let dir = TempDir::new().unwrap();
        let authz = MemberAuthorizer::open(&dir.path().join("docshare.db")).unwrap();
        let err = authz
            .authorize("alice", ResourceType::ApiDocShare, "missing")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
