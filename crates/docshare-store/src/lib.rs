// ABOUTME: Persistence layer for docshare: SQLite share records and catalog, export files on disk.
// ABOUTME: Every store implements a docshare-core trait so the server can swap in fakes for tests.

pub mod authz;
pub mod catalog;
pub mod files;
pub mod sqlite;

pub use authz::MemberAuthorizer;
pub use catalog::{CatalogSeed, ImportSummary, PluginScript, ProjectMember, SqliteCatalog};
pub use files::{FileStoreError, FsExportStore};
pub use sqlite::{SqliteError, SqliteShareStore, open_connection};
