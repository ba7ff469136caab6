use serde::{Deserialize, Serialize};

use crate::constants::{
    DATASET_FILES_CONNECTION, FinalizeOperation, IMPORT_DATASET_CONNECTION,
    IMPORT_LABBOOK_CONNECTION, SECRETS_CONNECTION, UploadOperation,
};

/// Kind of remote collection an upload appends to.
///
/// Resolved once from the connection key when a transaction is built, so
/// the rest of the pipeline never inspects connection strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    ProjectFile,
    DatasetFile,
    ImportLabbook,
    ImportDataset,
    SecretsFile,
}

impl TargetKind {
    /// Maps a connection key to a target kind. Unknown keys are project files.
    pub fn from_connection(connection: &str) -> Self {
        match connection {
            DATASET_FILES_CONNECTION => Self::DatasetFile,
            IMPORT_LABBOOK_CONNECTION => Self::ImportLabbook,
            IMPORT_DATASET_CONNECTION => Self::ImportDataset,
            SECRETS_CONNECTION => Self::SecretsFile,
            _ => Self::ProjectFile,
        }
    }

    /// Remote operation that receives each chunk.
    pub fn operation(self) -> UploadOperation {
        match self {
            Self::ProjectFile => UploadOperation::AddProjectFile,
            Self::DatasetFile => UploadOperation::AddDatasetFile,
            Self::ImportLabbook => UploadOperation::ImportLabbook,
            Self::ImportDataset => UploadOperation::ImportDataset,
            Self::SecretsFile => UploadOperation::UploadSecretsFile,
        }
    }

    /// Remote operation that closes the transaction.
    pub fn finalize_operation(self) -> FinalizeOperation {
        match self {
            Self::DatasetFile | Self::ImportDataset => {
                FinalizeOperation::CompleteDatasetUploadTransaction
            }
            _ => FinalizeOperation::CompleteBatchUploadTransaction,
        }
    }
}

/// Identifies the remote collection to append uploaded files to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationTarget {
    pub owner: String,
    pub name: String,
    /// Connection key of the listing the new files belong to.
    pub connection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Project section (`code`, `input`, `output`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl MutationTarget {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            connection: connection.into(),
            parent_id: None,
            section: None,
        }
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn kind(&self) -> TargetKind {
        TargetKind::from_connection(&self.connection)
    }
}

/// File node created remotely once a file's final chunk lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNode {
    pub id: String,
    /// Path of the file within the collection.
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
}

/// Final state of an upload transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "completed")]
    Completed,
    /// Finalized, but some chunks were abandoned after exhausting retries.
    #[serde(rename = "completed_with_failures")]
    CompletedWithFailures,
    #[serde(rename = "finalize_failed")]
    FinalizeFailed,
    #[serde(rename = "cancelled")]
    Cancelled,
}
