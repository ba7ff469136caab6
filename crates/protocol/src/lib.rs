//! Wire types for the chunked upload pipeline.
//!
//! The remote collection service is opaque to the uploader: it accepts a
//! per-chunk upload request (JSON header plus raw chunk bytes) and a
//! transaction completion request. This crate only describes those shapes.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{FinalizeOperation, UploadOperation};
pub use messages::{
    ChunkPayload, ChunkUploadRequest, CompleteTransactionRequest, CompleteTransactionResponse,
    RemoteError,
};
pub use types::{MutationTarget, RemoteNode, TargetKind, UploadStatus};
