use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

/// Where a file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Bytes already held in memory; chunks are zero-copy slices.
    Memory(Bytes),
    /// A file on local disk, read by byte range on demand.
    Disk(PathBuf),
}

/// One file of an upload transaction.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the transaction's destination, `/`-separated.
    pub relative_path: String,
    /// Size in bytes, fixed when the entry is created.
    pub size: u64,
    pub source: FileSource,
}

impl FileEntry {
    /// Wraps in-memory bytes.
    pub fn from_bytes(relative_path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            relative_path: relative_path.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Wraps a file on disk whose size is already known.
    pub fn from_disk(relative_path: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
            source: FileSource::Disk(path.into()),
        }
    }

    /// File name component of the relative path.
    pub fn filename(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Identity of a logical chunk across retries: file path plus chunk index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub file_path: String,
    pub chunk_index: u32,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_path, self.chunk_index)
    }
}

/// One planned chunk of one file.
#[derive(Debug, Clone)]
pub struct ChunkDescriptor {
    pub chunk_id: String,
    /// Read-only back-reference to the owning file.
    pub file: Arc<FileEntry>,
    /// Per-file upload id shared by all chunks of `file`.
    pub upload_id: String,
    /// `[start, end)` within the file.
    pub byte_range: Range<u64>,
    pub chunk_index: u32,
    pub total_chunks_for_file: u32,
    /// Set when the chunk is taken into in-flight tracking.
    pub processed: bool,
    /// Set for a file's terminal chunk, held back until the second phase.
    pub is_deferred: bool,
}

impl ChunkDescriptor {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            file_path: self.file.relative_path.clone(),
            chunk_index: self.chunk_index,
        }
    }

    pub fn len(&self) -> u64 {
        self.byte_range.end - self.byte_range.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_last_of_file(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks_for_file
    }

    pub fn file_path(&self) -> &str {
        &self.file.relative_path
    }
}
