//! Chunk planning and byte access for multi-file chunked uploads.
//!
//! Nothing in here talks to the network: the planner turns a file set into
//! chunk descriptors, the reader turns a descriptor back into bytes, and the
//! progress reporter turns completion counts into status updates.

mod chunked;
mod planner;
mod progress;
mod types;
mod validation;

pub use chunked::{checksum_bytes, read_chunk};
pub use planner::{ChunkPlan, chunk_count, plan};
pub use progress::{ProgressCallback, ProgressReporter, ProgressUpdate, percentage};
pub use types::{ChunkDescriptor, ChunkKey, FileEntry, FileSource};
pub use validation::{remote_file_path, validate_upload_path};

/// Default chunk size: 48 MB (decimal).
pub const DEFAULT_CHUNK_SIZE: u64 = 48 * 1000 * 1000;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("{path} needs {count} chunks")]
    TooManyChunks { path: String, count: u64 },

    #[error("byte range {start}..{end} is outside of {path} ({size} bytes)")]
    OutOfRange {
        path: String,
        start: u64,
        end: u64,
        size: u64,
    },
}
