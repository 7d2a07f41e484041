// ABOUTME: HTTP server for docshare: share management, viewer tree/count, and export tasks.
// ABOUTME: Uses Axum over a ShareFacade that composes the core services with their stores.

pub mod actor;
pub mod api;
pub mod app_state;
pub mod audit;
pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod facade;
pub mod routes;

pub use app_state::{AppState, OpenError, SharedState};
pub use config::{ConfigError, DocshareConfig};
pub use facade::{Collaborators, ShareFacade};
pub use routes::create_router;
