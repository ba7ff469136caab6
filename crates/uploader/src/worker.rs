//! Chunk transmission: the per-chunk adapter and the pool that runs it.
//!
//! A fixed set of workers pulls dispatched chunks from one shared channel
//! and sends each result back to the driver. Transmission never fails
//! outwards: read errors, transport errors, panics and watchdog timeouts
//! all come back as [`TransmitResult::Failed`] for the retry path.
//!
//! Once the upload is cancelled no worker starts another transmission, and
//! running ones are abandoned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chunkload_protocol::{ChunkPayload, ChunkUploadRequest, MutationTarget, RemoteNode, UploadOperation};
use chunkload_transfer::{ChunkDescriptor, TransferError, checksum_bytes, read_chunk, remote_file_path};
use futures_util::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{TransportError, UploadError};
use crate::transport::UploadTransport;
use crate::types::UploadTransaction;

/// Result of one transmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitResult {
    Success { node: Option<RemoteNode> },
    Failed { reason: String },
}

/// Per-transaction fields shared by every chunk request.
#[derive(Debug, Clone)]
pub struct TransmitContext {
    pub transaction_id: String,
    pub target: MutationTarget,
    pub operation: UploadOperation,
    pub destination: String,
    pub access_token: Option<String>,
    pub chunk_size: u64,
}

impl TransmitContext {
    pub fn new(transaction: &UploadTransaction, access_token: Option<String>, chunk_size: u64) -> Self {
        Self {
            transaction_id: transaction.id.clone(),
            target: transaction.target.clone(),
            operation: transaction.kind.operation(),
            destination: transaction.destination.clone(),
            access_token,
            chunk_size,
        }
    }

    /// Builds the request header for `chunk` carrying `data`.
    pub fn chunk_request(
        &self,
        chunk: &ChunkDescriptor,
        data: &[u8],
    ) -> Result<ChunkUploadRequest, TransferError> {
        let filepath = remote_file_path(&self.destination, chunk.file_path())?;

        Ok(ChunkUploadRequest {
            connection_key: self.target.connection.clone(),
            owner: self.target.owner.clone(),
            name: self.target.name.clone(),
            parent_id: self.target.parent_id.clone(),
            filepath,
            chunk: ChunkPayload {
                upload_id: chunk.upload_id.clone(),
                filename: chunk.file.filename().to_string(),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks_for_file,
                chunk_size: self.chunk_size,
                file_size_kb: chunk.file.size.div_ceil(1000),
                checksum: checksum_bytes(data),
            },
            access_token: self.access_token.clone(),
            section: self.target.section.clone(),
            transaction_id: self.transaction_id.clone(),
        })
    }
}

/// Transmits single chunks through an [`UploadTransport`].
pub struct UploadWorker {
    transport: Arc<dyn UploadTransport>,
    context: TransmitContext,
    timeout: Duration,
}

impl UploadWorker {
    pub fn new(transport: Arc<dyn UploadTransport>, context: TransmitContext, timeout: Duration) -> Self {
        Self {
            transport,
            context,
            timeout,
        }
    }

    pub fn context(&self) -> &TransmitContext {
        &self.context
    }

    /// Reads, checksums and sends `chunk`, bounded by the watchdog timeout.
    pub async fn transmit(&self, chunk: &ChunkDescriptor) -> TransmitResult {
        let attempt = AssertUnwindSafe(self.try_transmit(chunk)).catch_unwind();

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(Ok(node))) => TransmitResult::Success { node },
            Ok(Ok(Err(e))) => TransmitResult::Failed {
                reason: e.to_string(),
            },
            Ok(Err(_)) => TransmitResult::Failed {
                reason: "upload worker panicked".into(),
            },
            Err(_) => TransmitResult::Failed {
                reason: TransportError::Timeout(self.timeout).to_string(),
            },
        }
    }

    async fn try_transmit(&self, chunk: &ChunkDescriptor) -> Result<Option<RemoteNode>, UploadError> {
        let data = read_chunk(chunk).await?;
        let request = self.context.chunk_request(chunk, &data)?;
        let node = self
            .transport
            .upload_chunk(self.context.operation, request, data)
            .await?;
        Ok(node)
    }
}

/// A chunk together with the result of transmitting it.
#[derive(Debug)]
pub struct Resolved {
    pub chunk: ChunkDescriptor,
    pub result: TransmitResult,
}

/// Fixed-size pool of upload workers.
pub struct WorkerPool {
    dispatch_tx: Option<mpsc::Sender<ChunkDescriptor>>,
    results_rx: mpsc::Receiver<Resolved>,
    workers: JoinSet<()>,
    stop: CancellationToken,
}

impl WorkerPool {
    /// Starts `size` workers sharing `worker`.
    ///
    /// After `halt` fires, chunks are resolved as failed without reaching the
    /// transport. Workers keep draining the queue until [`shutdown`].
    ///
    /// Both channels hold `size` entries; the caller never has more than
    /// `size` chunks outstanding, so neither side blocks for long.
    ///
    /// [`shutdown`]: WorkerPool::shutdown
    pub fn spawn(worker: UploadWorker, size: usize, halt: CancellationToken) -> Self {
        let size = size.max(1);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(size);
        let (results_tx, results_rx) = mpsc::channel(size);
        let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));
        let worker = Arc::new(worker);
        let stop = CancellationToken::new();

        let mut workers = JoinSet::new();
        for id in 0..size {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&worker),
                Arc::clone(&dispatch_rx),
                results_tx.clone(),
                halt.clone(),
                stop.clone(),
            ));
        }

        Self {
            dispatch_tx: Some(dispatch_tx),
            results_rx,
            workers,
            stop,
        }
    }

    /// Queues `chunk` for the next free worker.
    pub async fn dispatch(&self, chunk: ChunkDescriptor) -> Result<(), UploadError> {
        let Some(tx) = &self.dispatch_tx else {
            return Err(UploadError::WorkerPool("pool is shut down".into()));
        };
        tx.send(chunk)
            .await
            .map_err(|_| UploadError::WorkerPool("all workers exited".into()))
    }

    /// Waits for the next finished transmission. `None` once every worker exited.
    pub async fn next_resolved(&mut self) -> Option<Resolved> {
        self.results_rx.recv().await
    }

    /// Stops all workers, abandoning transmissions still running.
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        self.dispatch_tx.take();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "upload worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    worker: Arc<UploadWorker>,
    queue: Arc<Mutex<mpsc::Receiver<ChunkDescriptor>>>,
    results: mpsc::Sender<Resolved>,
    halt: CancellationToken,
    stop: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                chunk = rx.recv() => chunk,
            }
        };
        let Some(chunk) = next else {
            break;
        };

        let result = if halt.is_cancelled() {
            debug!(worker = id, chunk = %chunk.key(), "upload cancelled, chunk not sent");
            cancelled()
        } else {
            debug!(worker = id, chunk = %chunk.key(), "transmitting chunk");
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = halt.cancelled() => cancelled(),
                result = worker.transmit(&chunk) => result,
            }
        };

        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            sent = results.send(Resolved { chunk, result }) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!(worker = id, "upload worker stopped");
}

fn cancelled() -> TransmitResult {
    TransmitResult::Failed {
        reason: "upload cancelled".into(),
    }
}
