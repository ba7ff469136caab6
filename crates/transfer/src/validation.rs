use std::path::{Component, Path};

use crate::TransferError;

/// Validates a file path relative to an upload's destination.
///
/// Backslashes are treated as separators so Windows-style relative paths
/// are checked the same way on every platform. Rejects empty paths,
/// absolute paths, prefixes and any `..` component.
pub fn validate_upload_path(file_path: &str) -> Result<(), TransferError> {
    if file_path.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let normalized = file_path.replace('\\', "/");
    let path = Path::new(&normalized);

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {file_path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    // `C:/x` parses as a normal component outside Windows.
    if normalized.len() >= 2 && normalized.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidPath(format!(
            "drive prefix not allowed: {file_path}"
        )));
    }

    Ok(())
}

/// Builds the remote `filepath` of a file: `destination` joined with the
/// validated relative path, `/`-separated, without `.` segments.
pub fn remote_file_path(destination: &str, relative: &str) -> Result<String, TransferError> {
    validate_upload_path(relative)?;

    let keep = |s: &&str| !s.is_empty() && *s != ".";
    let parts: Vec<&str> = relative.split(['/', '\\']).filter(keep).collect();
    if parts.is_empty() {
        return Err(TransferError::InvalidPath(format!(
            "path names no file: {relative}"
        )));
    }

    let mut joined: Vec<&str> = destination.split(['/', '\\']).filter(keep).collect();
    joined.extend(parts);
    Ok(joined.join("/"))
}
