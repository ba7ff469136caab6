//! In-memory stand-in for the remote collection service.
//!
//! Reassembles files from their chunks, verifies each checksum and answers
//! the last chunk of a complete file with a new node. Failures are injected
//! at random or for configured paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use chunkload_protocol::{
    ChunkUploadRequest, CompleteTransactionRequest, CompleteTransactionResponse,
    FinalizeOperation, RemoteError, RemoteNode, UploadOperation,
};
use chunkload_transfer::checksum_bytes;
use chunkload_uploader::{TransportError, TransportFuture, UploadTransport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimulationConfig;

/// Chunks received so far for one upload id.
#[derive(Debug, Default)]
struct Assembly {
    filepath: String,
    received: BTreeMap<u32, u64>,
}

pub struct SimulatedRemote {
    settings: SimulationConfig,
    rng: Mutex<StdRng>,
    assemblies: Mutex<HashMap<String, Assembly>>,
    committed: Mutex<Vec<String>>,
}

impl SimulatedRemote {
    pub fn new(settings: SimulationConfig) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            rng: Mutex::new(rng),
            assemblies: Mutex::new(HashMap::new()),
            committed: Mutex::new(Vec::new()),
        }
    }

    /// Transactions committed so far.
    pub fn committed(&self) -> Vec<String> {
        self.committed.lock().unwrap().clone()
    }

    fn inject_failure(&self, filepath: &str) -> Option<TransportError> {
        if self.settings.always_fail.iter().any(|p| p == filepath) {
            return Some(TransportError::Remote(RemoteError {
                code: 403,
                message: format!("{filepath} is not writable"),
            }));
        }
        let roll = self.rng.lock().unwrap().gen_bool(self.settings.failure_rate);
        roll.then(|| TransportError::Connection("simulated network failure".into()))
    }

    fn accept(&self, request: &ChunkUploadRequest, len: u64) -> Result<Option<RemoteNode>, TransportError> {
        let mut assemblies = self.assemblies.lock().unwrap();
        let assembly = assemblies
            .entry(request.chunk.upload_id.clone())
            .or_insert_with(|| Assembly {
                filepath: request.filepath.clone(),
                received: BTreeMap::new(),
            });
        assembly.received.insert(request.chunk.chunk_index, len);

        if !request.is_last_chunk() {
            return Ok(None);
        }

        let total = request.chunk.total_chunks;
        let missing = (0..total)
            .filter(|i| !assembly.received.contains_key(i))
            .count();
        if missing > 0 {
            return Err(TransportError::Remote(RemoteError {
                code: 409,
                message: format!("{} is missing {missing} chunk(s)", assembly.filepath),
            }));
        }

        let size = assembly.received.values().sum();
        let filepath = assembly.filepath.clone();
        assemblies.remove(&request.chunk.upload_id);

        Ok(Some(RemoteNode {
            id: uuid::Uuid::new_v4().to_string(),
            key: filepath,
            size,
            is_dir: false,
            modified_at: None,
        }))
    }
}

impl UploadTransport for SimulatedRemote {
    fn upload_chunk(
        &self,
        operation: UploadOperation,
        request: ChunkUploadRequest,
        data: Bytes,
    ) -> TransportFuture<'_, Option<RemoteNode>> {
        Box::pin(async move {
            if self.settings.latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.latency_ms)).await;
            }

            if checksum_bytes(&data) != request.chunk.checksum {
                return Err(TransportError::Malformed(format!(
                    "checksum mismatch for {}#{}",
                    request.filepath, request.chunk.chunk_index
                )));
            }
            if let Some(err) = self.inject_failure(&request.filepath) {
                return Err(err);
            }

            debug!(
                operation = operation.as_str(),
                file = %request.filepath,
                chunk = request.chunk.chunk_index,
                bytes = data.len(),
                "chunk received"
            );
            self.accept(&request, data.len() as u64)
        })
    }

    fn complete_transaction(
        &self,
        operation: FinalizeOperation,
        request: CompleteTransactionRequest,
    ) -> TransportFuture<'_, CompleteTransactionResponse> {
        Box::pin(async move {
            info!(
                operation = operation.as_str(),
                transaction = %request.transaction_id,
                cancel = request.cancel,
                rollback = request.rollback,
                "transaction completed"
            );
            if !request.rollback {
                self.committed.lock().unwrap().push(request.transaction_id);
            }
            Ok(CompleteTransactionResponse {
                success: true,
                message: None,
            })
        })
    }
}
