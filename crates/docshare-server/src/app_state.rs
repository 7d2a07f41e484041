// ABOUTME: Shared application state for the docshare HTTP server.
// ABOUTME: Wires the SQLite stores, export directory, and audit sink into one ShareFacade.

use std::sync::Arc;

use docshare_core::ExportJobManager;
use docshare_store::{FsExportStore, MemberAuthorizer, SqliteCatalog, SqliteError, SqliteShareStore};

use thiserror::Error;

use crate::audit::TracingAuditSink;
use crate::config::DocshareConfig;
use crate::facade::{Collaborators, ShareFacade};

/// Errors that can occur while opening the server's stores.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("cannot create data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] SqliteError),
}

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub facade: ShareFacade,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(facade: ShareFacade) -> Self {
        Self { facade }
    }

    /// Open the on-disk stores under `config.home`, creating the database
    /// and export directory as needed.
    pub fn open(config: &DocshareConfig) -> Result<Self, OpenError> {
        std::fs::create_dir_all(&config.home)?;
        let db = config.db_path();
        let catalog = Arc::new(SqliteCatalog::open(&db, config.default_protocol.clone())?);
        let files = Arc::new(FsExportStore::new(config.exports_dir()));

        let facade = ShareFacade::new(
            Collaborators {
                store: Arc::new(SqliteShareStore::open(&db)?),
                catalog: catalog.clone(),
                protocols: catalog.clone(),
                scripts: catalog,
                authorizer: Arc::new(MemberAuthorizer::open(&db)?),
                audit: Arc::new(TracingAuditSink),
                jobs: ExportJobManager::with_retention(files, config.export_retention),
            },
            config.max_page_size,
        );
        tracing::info!(db = %db.display(), "docshare stores opened");
        Ok(Self::new(facade))
    }
}
