//! Upload request, transaction context, events and outcome.

use std::sync::Arc;

use chunkload_protocol::{MutationTarget, RemoteNode, TargetKind, UploadStatus};
use chunkload_transfer::{FileEntry, ProgressUpdate};
use uuid::Uuid;

use crate::coordinator::UploadState;
use crate::error::UploadError;

/// Everything needed to start an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub files: Vec<FileEntry>,
    /// Directory within the collection the files land in.
    pub destination: String,
    pub target: MutationTarget,
    pub access_token: Option<String>,
}

impl UploadRequest {
    pub fn new(files: Vec<FileEntry>, destination: impl Into<String>, target: MutationTarget) -> Self {
        Self {
            files,
            destination: destination.into(),
            target,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// In-memory state of one upload transaction.
///
/// Totals are fixed at creation; the uploaded counters only grow.
#[derive(Debug, Clone)]
pub struct UploadTransaction {
    pub id: String,
    pub files: Vec<Arc<FileEntry>>,
    pub destination: String,
    pub target: MutationTarget,
    /// Resolved once from `target.connection`.
    pub kind: TargetKind,
    pub total_size: u64,
    pub total_files: usize,
    pub uploaded_size: u64,
    pub uploaded_chunks: usize,
}

impl UploadTransaction {
    pub fn new(files: Vec<FileEntry>, destination: impl Into<String>, target: MutationTarget) -> Self {
        let files: Vec<Arc<FileEntry>> = files.into_iter().map(Arc::new).collect();
        Self {
            id: Uuid::new_v4().to_string(),
            total_size: files.iter().map(|f| f.size).sum(),
            total_files: files.len(),
            files,
            destination: destination.into(),
            kind: target.kind(),
            target,
            uploaded_size: 0,
            uploaded_chunks: 0,
        }
    }
}

/// Events emitted while an upload runs.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    StateChanged(UploadState),
    Progress(ProgressUpdate),
    /// A file finished assembling remotely and can be added to listings.
    NodeCreated {
        node: RemoteNode,
        target: MutationTarget,
    },
    /// Chunks were abandoned; one message covers every affected file.
    Failed {
        message: String,
        paths: Vec<String>,
    },
    FinalizeFailed {
        message: String,
    },
}

/// Summary returned once a transaction is done.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub transaction_id: String,
    pub status: UploadStatus,
    pub uploaded_chunks: usize,
    pub uploaded_bytes: u64,
    pub total_chunks: usize,
    pub failed_paths: Vec<String>,
    pub failure_message: Option<String>,
    /// Why the remote finalize failed, if it did.
    pub finalize_error: Option<String>,
    pub nodes: Vec<RemoteNode>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Completed
    }

    /// Errors if the transaction was cancelled or never committed remotely.
    pub fn ensure_committed(&self) -> Result<(), UploadError> {
        match self.status {
            UploadStatus::Cancelled => Err(UploadError::Cancelled),
            UploadStatus::FinalizeFailed => Err(UploadError::FinalizeFailed(
                self.finalize_error.clone().unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_totals() {
        let target = MutationTarget::new("alice", "demo", "CodeBrowser_allFiles");
        let tx = UploadTransaction::new(
            vec![
                FileEntry::from_bytes("a.txt", vec![0u8; 10]),
                FileEntry::from_bytes("b.txt", vec![0u8; 5]),
            ],
            "code",
            target,
        );
        assert_eq!(tx.total_files, 2);
        assert_eq!(tx.total_size, 15);
        assert_eq!(tx.uploaded_chunks, 0);
        assert!(!tx.id.is_empty());
        assert_eq!(tx.kind, TargetKind::ProjectFile);
    }

    #[test]
    fn transaction_kind_follows_connection() {
        let target = MutationTarget::new("alice", "measurements", "DataBrowser_allFiles");
        let tx = UploadTransaction::new(Vec::new(), "", target);
        assert_eq!(tx.kind, TargetKind::DatasetFile);
    }

    #[test]
    fn transaction_ids_are_unique() {
        let target = MutationTarget::new("alice", "demo", "CodeBrowser_allFiles");
        let a = UploadTransaction::new(Vec::new(), "", target.clone());
        let b = UploadTransaction::new(Vec::new(), "", target);
        assert_ne!(a.id, b.id);
    }
}
