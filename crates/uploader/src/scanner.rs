//! File scanning for upload.
//!
//! Recursively walks a directory and produces disk-backed file entries
//! with relative paths normalized to forward slashes.

use std::path::Path;

use chunkload_transfer::FileEntry;
use tracing::debug;

use crate::error::UploadError;

/// Scans a directory recursively and returns file entries for upload,
/// sorted by relative path.
pub fn scan_files_for_upload(root_path: &Path) -> Result<Vec<FileEntry>, UploadError> {
    let mut files = Vec::new();
    walk_dir(root_path, root_path, &mut files)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    debug!(
        root = %root_path.display(),
        files = files.len(),
        total_bytes = files.iter().map(|f| f.size).sum::<u64>(),
        "scan complete"
    );
    Ok(files)
}

fn walk_dir(root: &Path, current: &Path, files: &mut Vec<FileEntry>) -> Result<(), UploadError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, files)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            files.push(FileEntry::from_disk(rel_str, path.clone(), metadata.len()));
        }
    }

    Ok(())
}
