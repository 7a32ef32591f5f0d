//! Unified error handling for the warranty lifecycle core.
//!
//! `WarrantyError` is what the request-handling layer sees. Allocation
//! retries are already spent by the time one of these surfaces; the
//! handler should report a transient conflict to its client, never fall
//! back to a non-unique code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

/// Application-level error type for warranty operations.
#[derive(Debug, Error)]
pub enum WarrantyError {
    /// The allocator failed to obtain a unique code within the retry
    /// bound.
    #[error("could not allocate a unique warranty code after {attempts} attempts")]
    AllocationExhausted {
        /// How many proposals were attempted.
        attempts: u32,
    },

    /// The storage layer rejected the insert on the per-header serial
    /// constraint. Effectively unreachable once serials pass through
    /// [`crate::codes::resolve_serials`], but a direct caller can still
    /// trip it.
    #[error("duplicate serial within the warranty")]
    SerialConflict,

    /// A creation request with no items; a header is always created with
    /// at least one.
    #[error("a warranty needs at least one item")]
    NoItems,

    /// Storage collaborator failure, propagated unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for WarrantyError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Storage(_)) {
            tracing::error!(error = %self, "request error");
        }

        let status = match &self {
            Self::AllocationExhausted { .. } | Self::SerialConflict => StatusCode::CONFLICT,
            Self::NoItems => StatusCode::BAD_REQUEST,
            Self::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose backend error details to clients
        let message = match &self {
            Self::Storage(StorageError::NotFound) => "Not found".to_owned(),
            Self::Storage(_) => "Internal server error".to_owned(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `WarrantyError`.
pub type Result<T> = std::result::Result<T, WarrantyError>;
