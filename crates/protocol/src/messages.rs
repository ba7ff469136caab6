use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chunk upload
// ---------------------------------------------------------------------------

/// Per-chunk metadata sent alongside the raw chunk bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    /// Groups all chunks of one file on the remote side.
    pub upload_id: String,
    pub filename: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Nominal chunk size for the transaction, in bytes.
    pub chunk_size: u64,
    pub file_size_kb: u64,
    /// SHA-256 hex digest of the chunk bytes.
    pub checksum: String,
}

/// Header of a chunk upload; the chunk bytes travel separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadRequest {
    pub connection_key: String,
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Destination path of the file within the collection.
    pub filepath: String,
    pub chunk: ChunkPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub transaction_id: String,
}

impl ChunkUploadRequest {
    /// Returns `true` if this is the final chunk of its file.
    pub fn is_last_chunk(&self) -> bool {
        self.chunk.chunk_index + 1 >= self.chunk.total_chunks
    }
}

// ---------------------------------------------------------------------------
// Transaction completion
// ---------------------------------------------------------------------------

/// Closes an upload transaction.
///
/// `cancel` and `rollback` are both set when the caller aborted the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransactionRequest {
    pub connection_key: String,
    pub owner: String,
    pub name: String,
    pub cancel: bool,
    pub rollback: bool,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransactionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("remote error {code}: {message}")]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(index: u32, total: u32) -> ChunkUploadRequest {
        ChunkUploadRequest {
            connection_key: "CodeBrowser_allFiles".into(),
            owner: "alice".into(),
            name: "demo".into(),
            parent_id: None,
            filepath: "code/model.bin".into(),
            chunk: ChunkPayload {
                upload_id: "u1".into(),
                filename: "model.bin".into(),
                chunk_index: index,
                total_chunks: total,
                chunk_size: 16,
                file_size_kb: 1,
                checksum: String::new(),
            },
            access_token: None,
            section: Some("code".into()),
            transaction_id: "tx-1".into(),
        }
    }

    #[test]
    fn chunk_request_field_names() {
        let json = serde_json::to_string(&sample_request(0, 2)).unwrap();
        assert!(json.contains("\"connectionKey\""));
        assert!(json.contains("\"transactionId\":\"tx-1\""));
        assert!(json.contains("\"chunkIndex\":0"));
        assert!(json.contains("\"fileSizeKb\":1"));
        assert!(!json.contains("accessToken"));
        assert!(!json.contains("parentId"));
    }

    #[test]
    fn last_chunk_detection() {
        assert!(!sample_request(0, 2).is_last_chunk());
        assert!(sample_request(1, 2).is_last_chunk());
        assert!(sample_request(0, 1).is_last_chunk());
    }

    #[test]
    fn complete_request_parses_from_camel_case() {
        let json = r#"{"connectionKey":"k","owner":"o","name":"n","cancel":true,"rollback":true,"transactionId":"t"}"#;
        let req: CompleteTransactionRequest = serde_json::from_str(json).unwrap();
        assert!(req.cancel && req.rollback);
        assert_eq!(req.transaction_id, "t");
    }

    #[test]
    fn remote_error_display() {
        let err = RemoteError {
            code: 500,
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "remote error 500: disk full");
    }
}
