//! Uploader error types.

use std::time::Duration;

use chunkload_protocol::RemoteError;

use crate::config::ConfigError;

/// Errors returned by an [`UploadTransport`](crate::UploadTransport).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors produced while setting up or driving an upload.
///
/// Individual chunk failures never show up here; they go through the
/// retry path and end up in the [`UploadOutcome`](crate::UploadOutcome).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no files to upload")]
    NoFiles,

    #[error("invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("worker pool failure: {0}")]
    WorkerPool(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] chunkload_transfer::TransferError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
