// ABOUTME: Error taxonomy shared by every docshare layer.
// ABOUTME: Store, builder, and export failures all surface as a ShareError variant.

use thiserror::Error;

/// Errors produced by share, tree, and export operations.
///
/// Lower layers wrap their own failures (sqlite, io, serialization) into
/// `Internal`; the HTTP layer maps each variant to a status code and never
/// echoes the `Internal` payload to callers.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShareError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for the NotFound variant, regardless of resource kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
