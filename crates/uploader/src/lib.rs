//! Chunked multi-file upload with bounded concurrency.
//!
//! Library crate with no knowledge of the remote service: the caller
//! provides an [`UploadTransport`] and receives progress on an event
//! channel.
//!
//! # Pipeline
//!
//! 1. **Plan**: split every file into chunks, holding back each file's last chunk
//! 2. **Upload**: keep up to `max_concurrency` chunks in flight, retrying failures
//! 3. **Drain**: send the held-back last chunks once everything else resolved
//! 4. **Finalize**: commit (or roll back) the transaction remotely

pub mod config;
pub mod coordinator;
pub mod dead_letter;
pub mod error;
pub mod queue;
pub mod scanner;
pub mod transport;
pub mod types;
pub mod uploader;
pub mod worker;

#[cfg(test)]
mod mock;

// Re-export primary types for convenience.
pub use config::{ConfigError, UploaderConfig};
pub use coordinator::{Action, Coordinator, UploadState};
pub use dead_letter::{DeadLetterHandler, DeadLetterRecord, RetryDecision};
pub use error::{TransportError, UploadError};
pub use queue::{InFlightTracker, WorkQueue};
pub use scanner::scan_files_for_upload;
pub use transport::{TransportFuture, UploadTransport};
pub use types::{UploadEvent, UploadOutcome, UploadRequest, UploadTransaction};
pub use uploader::{UploadHandle, Uploader};
pub use worker::{Resolved, TransmitContext, TransmitResult, UploadWorker, WorkerPool};
