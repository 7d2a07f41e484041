// ABOUTME: Core library for docshare: share records, access checks, module trees, and exports.
// ABOUTME: Storage and transport live in docshare-store and docshare-server; this crate owns the rules.

pub mod access;
pub mod collab;
pub mod definition;
pub mod error;
pub mod export;
pub mod jobs;
pub mod model;
pub mod password;
pub mod scope;
pub mod store;
pub mod testing;
pub mod tree;

pub use access::AccessGuard;
pub use collab::{
    AuditAction, AuditEvent, AuditSink, Authorizer, DefinitionCatalog, ExportDownload, ExportFile,
    ExportFileStore, ProtocolRegistry, ResourceType, ScriptRegistry,
};
pub use definition::{ApiDefinition, ApiModule};
pub use error::ShareError;
pub use export::ExportFormat;
pub use jobs::{
    DEFAULT_TASK_RETENTION, ExportJobManager, ExportRequest, ExportTask, StopOutcome, TaskStatus,
};
pub use model::{
    InvalidUnit, MatchSymbol, Page, PageRequest, ShareDetail, ShareDraft, ShareFilter,
    ShareRecord, ShareScope, ShareSummary, SortColumn, SortOrder, Validity,
};
pub use scope::ScopeMatcher;
pub use store::ShareRecordStore;
pub use tree::{ModuleNode, ModuleTreeBuilder, ShareForest, TreeQuery};
