use std::io::SeekFrom;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::types::{ChunkDescriptor, FileSource};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Loads the bytes covered by `chunk` from its file's source.
///
/// In-memory sources are sliced without copying. Disk sources are opened,
/// seeked and read for exactly the chunk's length, so a file that shrank
/// since planning surfaces as an I/O error rather than a short chunk.
pub async fn read_chunk(chunk: &ChunkDescriptor) -> Result<Bytes, TransferError> {
    let range = chunk.byte_range.clone();
    let out_of_range = |size: u64| TransferError::OutOfRange {
        path: chunk.file.relative_path.clone(),
        start: range.start,
        end: range.end,
        size,
    };

    if range.start > range.end || range.end > chunk.file.size {
        return Err(out_of_range(chunk.file.size));
    }

    match &chunk.file.source {
        FileSource::Memory(data) => {
            if range.end > data.len() as u64 {
                return Err(out_of_range(data.len() as u64));
            }
            Ok(data.slice(range.start as usize..range.end as usize))
        }
        FileSource::Disk(path) => {
            if range.start == range.end {
                return Ok(Bytes::new());
            }
            let mut file = tokio::fs::File::open(path).await?;
            file.seek(SeekFrom::Start(range.start)).await?;
            let mut buf = vec![0u8; (range.end - range.start) as usize];
            file.read_exact(&mut buf).await?;
            Ok(Bytes::from(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::planner::plan;
    use crate::types::FileEntry;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn checksum_bytes_deterministic() {
        let c1 = checksum_bytes(b"hello world");
        let c2 = checksum_bytes(b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.len(), 64);
        assert_ne!(c1, checksum_bytes(b"hello"));
    }

    #[tokio::test]
    async fn memory_chunks_cover_the_payload() {
        let entry = Arc::new(FileEntry::from_bytes("a.bin", b"AABBCCDDEE".to_vec()));
        let plan = plan(&[entry], 4).unwrap();

        let mut all = Vec::new();
        for chunk in plan.immediate.iter().chain(plan.deferred.iter()) {
            all.extend_from_slice(&read_chunk(chunk).await.unwrap());
        }
        assert_eq!(&all, b"AABBCCDDEE");
        assert_eq!(&read_chunk(&plan.deferred[0]).await.unwrap()[..], b"EE");
    }

    #[tokio::test]
    async fn disk_chunk_reads_exact_range() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");
        let entry = Arc::new(FileEntry::from_disk("test.bin", &path, 10));
        let plan = plan(&[entry], 4).unwrap();

        assert_eq!(&read_chunk(&plan.immediate[1]).await.unwrap()[..], b"4567");
        assert_eq!(&read_chunk(&plan.deferred[0]).await.unwrap()[..], b"89");
    }

    #[tokio::test]
    async fn empty_file_reads_empty_chunk_without_opening() {
        let entry = Arc::new(FileEntry::from_disk("gone.bin", "/nonexistent/gone.bin", 0));
        let plan = plan(&[entry], 4).unwrap();
        assert!(read_chunk(&plan.deferred[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_disk_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "short.bin", b"0123");
        // Planned as if the file still had 10 bytes.
        let entry = Arc::new(FileEntry::from_disk("short.bin", &path, 10));
        let plan = plan(&[entry], 8).unwrap();

        let result = read_chunk(&plan.immediate[0]).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn range_past_memory_payload_is_rejected() {
        let entry = Arc::new(FileEntry {
            relative_path: "lying.bin".into(),
            size: 10,
            source: FileSource::Memory(Bytes::from_static(b"abc")),
        });
        let plan = plan(&[entry], 4).unwrap();
        let result = read_chunk(&plan.immediate[0]).await;
        assert!(matches!(result, Err(TransferError::OutOfRange { .. })));
    }
}
