//! Splits a file set into chunk descriptors.
//!
//! Each file's terminal chunk goes to the deferred list so it is only sent
//! after every other chunk of that file has resolved; the remote side treats
//! that chunk as the file's end-of-upload marker.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::TransferError;
use crate::types::{ChunkDescriptor, FileEntry};

/// Output of [`plan`].
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    /// Every non-terminal chunk, file by file in input order.
    pub immediate: Vec<ChunkDescriptor>,
    /// One terminal chunk per file.
    pub deferred: Vec<ChunkDescriptor>,
    pub total_chunks: usize,
}

/// Number of chunks a file of `size` bytes splits into.
///
/// Empty files still produce one zero-length chunk.
pub fn chunk_count(size: u64, chunk_size: u64) -> u64 {
    if size == 0 { 1 } else { size.div_ceil(chunk_size) }
}

/// Plans the chunks for `files` at `chunk_size` bytes per chunk.
pub fn plan(files: &[Arc<FileEntry>], chunk_size: u64) -> Result<ChunkPlan, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }

    let mut out = ChunkPlan::default();

    for file in files {
        let count = chunk_count(file.size, chunk_size);
        let total = u32::try_from(count).map_err(|_| TransferError::TooManyChunks {
            path: file.relative_path.clone(),
            count,
        })?;
        let upload_id = Uuid::new_v4().to_string();

        for index in 0..total {
            let start = u64::from(index) * chunk_size;
            let end = (start + chunk_size).min(file.size);
            let is_last = index + 1 == total;

            let chunk = ChunkDescriptor {
                chunk_id: Uuid::new_v4().to_string(),
                file: Arc::clone(file),
                upload_id: upload_id.clone(),
                byte_range: start..end,
                chunk_index: index,
                total_chunks_for_file: total,
                processed: false,
                is_deferred: is_last,
            };

            if is_last {
                out.deferred.push(chunk);
            } else {
                out.immediate.push(chunk);
            }
        }

        out.total_chunks += total as usize;
    }

    debug!(
        files = files.len(),
        immediate = out.immediate.len(),
        deferred = out.deferred.len(),
        chunk_size,
        "chunk plan built"
    );

    Ok(out)
}
