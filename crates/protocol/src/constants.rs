use serde::{Deserialize, Serialize};

/// Connection key of the dataset file browser listing.
pub const DATASET_FILES_CONNECTION: &str = "DataBrowser_allFiles";

/// Connection key used when importing a whole project archive.
pub const IMPORT_LABBOOK_CONNECTION: &str = "ImportLabbook";

/// Connection key used when importing a whole dataset archive.
pub const IMPORT_DATASET_CONNECTION: &str = "ImportDataset";

/// Connection key of the project secrets store.
pub const SECRETS_CONNECTION: &str = "SecretsFile";

/// Remote operation that accepts one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadOperation {
    #[serde(rename = "addLabbookFile")]
    AddProjectFile,
    #[serde(rename = "addDatasetFile")]
    AddDatasetFile,
    #[serde(rename = "importLabbook")]
    ImportLabbook,
    #[serde(rename = "importDataset")]
    ImportDataset,
    #[serde(rename = "uploadSecretsFile")]
    UploadSecretsFile,
}

impl UploadOperation {
    /// Name of the remote mutation, as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddProjectFile => "addLabbookFile",
            Self::AddDatasetFile => "addDatasetFile",
            Self::ImportLabbook => "importLabbook",
            Self::ImportDataset => "importDataset",
            Self::UploadSecretsFile => "uploadSecretsFile",
        }
    }
}

/// Remote operation that closes an upload transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalizeOperation {
    #[serde(rename = "completeBatchUploadTransaction")]
    CompleteBatchUploadTransaction,
    #[serde(rename = "completeDatasetUploadTransaction")]
    CompleteDatasetUploadTransaction,
}

impl FinalizeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompleteBatchUploadTransaction => "completeBatchUploadTransaction",
            Self::CompleteDatasetUploadTransaction => "completeDatasetUploadTransaction",
        }
    }
}
