//! Upload entry point and async driver.
//!
//! [`Uploader`] validates a request, then [`Uploader::run`] plans the
//! chunks, feeds the worker pool from the coordinator's actions and
//! finalizes the transaction. Progress and results go out on the event
//! channel returned by [`Uploader::take_events`].

use std::collections::HashSet;
use std::sync::Arc;

use chunkload_protocol::{CompleteTransactionRequest, MutationTarget, RemoteNode, UploadStatus};
use chunkload_transfer::{ProgressCallback, ProgressReporter, remote_file_path};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UploaderConfig;
use crate::coordinator::{Action, Coordinator};
use crate::error::{TransportError, UploadError};
use crate::transport::UploadTransport;
use crate::types::{UploadEvent, UploadOutcome, UploadRequest, UploadTransaction};
use crate::worker::{TransmitContext, UploadWorker, WorkerPool};

/// One upload transaction, ready to run.
pub struct Uploader {
    transaction: UploadTransaction,
    transport: Arc<dyn UploadTransport>,
    config: UploaderConfig,
    access_token: Option<String>,
    progress: ProgressReporter,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl Uploader {
    /// Validates `request` and builds the transaction.
    ///
    /// Fails on an invalid config, an empty file list, a relative path that
    /// escapes the destination, or two files mapping to the same remote path.
    pub fn new(
        request: UploadRequest,
        transport: Arc<dyn UploadTransport>,
        config: UploaderConfig,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        if request.files.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let mut seen = HashSet::with_capacity(request.files.len());
        for file in &request.files {
            let remote = remote_file_path(&request.destination, &file.relative_path)?;
            if !seen.insert(remote.clone()) {
                return Err(UploadError::InvalidRequest(format!(
                    "duplicate file path: {remote}"
                )));
            }
        }

        let transaction = UploadTransaction::new(request.files, request.destination, request.target);
        info!(
            transaction = %transaction.id,
            files = transaction.total_files,
            total_bytes = transaction.total_size,
            connection = %transaction.target.connection,
            "upload created"
        );

        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        Ok(Self {
            transaction,
            transport,
            config,
            access_token: request.access_token,
            progress: ProgressReporter::new(),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `token` instead of the uploader's own cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Registers a synchronous progress callback, called next to the
    /// [`UploadEvent::Progress`] event.
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.progress.on_progress(callback);
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// The upload never waits on the receiver: once `event_buffer` events
    /// are pending, further events are dropped until it catches up.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token for this upload.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction.id
    }

    pub fn transaction(&self) -> &UploadTransaction {
        &self.transaction
    }

    /// Runs the transaction to completion.
    ///
    /// Chunk failures and a failed finalize are reported through the
    /// outcome status, not as `Err`.
    pub async fn run(self) -> Result<UploadOutcome, UploadError> {
        let Self {
            transaction,
            transport,
            config,
            access_token,
            progress,
            events_tx,
            events_rx,
            cancel,
        } = self;
        // Nobody claimed the events: drop the receiver so they are discarded.
        drop(events_rx);

        let target = transaction.target.clone();
        let context = TransmitContext::new(&transaction, access_token, config.chunk_size);
        let worker = UploadWorker::new(Arc::clone(&transport), context, config.chunk_timeout());
        let mut pool = WorkerPool::spawn(worker, config.max_concurrency, cancel.clone());

        let mut driver = Driver {
            coordinator: Coordinator::new(transaction, &config, progress),
            events_tx,
            target,
            nodes: Vec::new(),
            dropped_events: 0,
        };

        let driven = driver.drive(&mut pool, &cancel).await;
        pool.shutdown().await;
        let cancelled = driven?;

        let finalize_error = driver.finalize(transport.as_ref(), &config, cancelled).await;
        Ok(driver.complete(cancelled, finalize_error))
    }

    /// Spawns the upload and calls `finished` exactly once with its result.
    pub fn start_upload<F>(self, finished: F) -> UploadHandle
    where
        F: FnOnce(&Result<UploadOutcome, UploadError>) + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let transaction_id = self.transaction.id.clone();
        let join = tokio::spawn(async move {
            let result = self.run().await;
            finished(&result);
            result
        });

        UploadHandle {
            transaction_id,
            cancel,
            join,
        }
    }
}

/// Handle to an upload started with [`Uploader::start_upload`].
pub struct UploadHandle {
    transaction_id: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<UploadOutcome, UploadError>>,
}

impl UploadHandle {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Aborts the upload; the transaction is finalized with rollback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the upload task and returns its result.
    pub async fn wait(self) -> Result<UploadOutcome, UploadError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(UploadError::Cancelled),
            Err(e) => Err(UploadError::WorkerPool(e.to_string())),
        }
    }
}

/// Carries coordinator actions out against the pool and the event channel.
struct Driver {
    coordinator: Coordinator,
    events_tx: mpsc::Sender<UploadEvent>,
    target: MutationTarget,
    nodes: Vec<RemoteNode>,
    dropped_events: usize,
}

impl Driver {
    /// Runs until the coordinator asks to finalize; returns the cancel flag.
    async fn drive(
        &mut self,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<bool, UploadError> {
        let actions = if cancel.is_cancelled() {
            self.coordinator.cancel()
        } else {
            self.coordinator.start()?
        };
        if let Some(cancelled) = self.apply(actions, pool).await? {
            return Ok(cancelled);
        }

        loop {
            let actions = tokio::select! {
                biased;
                _ = cancel.cancelled() => self.coordinator.cancel(),
                resolved = pool.next_resolved() => match resolved {
                    Some(resolved) => self.coordinator.on_resolved(resolved.chunk, resolved.result),
                    None => return Err(UploadError::WorkerPool("all workers exited".into())),
                },
            };

            if let Some(cancelled) = self.apply(actions, pool).await? {
                return Ok(cancelled);
            }
        }
    }

    async fn apply(
        &mut self,
        actions: Vec<Action>,
        pool: &WorkerPool,
    ) -> Result<Option<bool>, UploadError> {
        let mut finalize = None;
        for action in actions {
            match action {
                Action::Dispatch(chunk) => pool.dispatch(chunk).await?,
                Action::Progress(update) => self.emit(UploadEvent::Progress(update)),
                Action::NodeCreated(node) => {
                    self.nodes.push(node.clone());
                    let target = self.target.clone();
                    self.emit(UploadEvent::NodeCreated { node, target });
                }
                Action::Transition(state) => self.emit(UploadEvent::StateChanged(state)),
                Action::Finalize { cancel } => finalize = Some(cancel),
            }
        }
        Ok(finalize)
    }

    /// Calls the remote finalize once. Returns the error message on failure.
    async fn finalize(
        &mut self,
        transport: &dyn UploadTransport,
        config: &UploaderConfig,
        cancelled: bool,
    ) -> Option<String> {
        let tx = self.coordinator.transaction();
        let operation = tx.kind.finalize_operation();
        let request = CompleteTransactionRequest {
            connection_key: tx.target.connection.clone(),
            owner: tx.target.owner.clone(),
            name: tx.target.name.clone(),
            cancel: cancelled,
            rollback: cancelled,
            transaction_id: tx.id.clone(),
        };
        let transaction_id = tx.id.clone();
        info!(
            transaction = %transaction_id,
            operation = operation.as_str(),
            cancel = cancelled,
            "finalizing transaction"
        );

        let timeout = config.chunk_timeout();
        let result =
            tokio::time::timeout(timeout, transport.complete_transaction(operation, request)).await;
        let message = match result {
            Ok(Ok(response)) if response.success => return None,
            Ok(Ok(response)) => response
                .message
                .unwrap_or_else(|| "remote rejected the transaction".into()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => TransportError::Timeout(timeout).to_string(),
        };

        error!(transaction = %transaction_id, error = %message, "finalize failed");
        self.emit(UploadEvent::FinalizeFailed {
            message: message.clone(),
        });
        Some(message)
    }

    fn complete(&mut self, cancelled: bool, finalize_error: Option<String>) -> UploadOutcome {
        let failed_paths = self.coordinator.failed_paths();
        let failure_message = self.coordinator.failure_message();

        if let Some(message) = &failure_message {
            warn!(
                transaction = %self.coordinator.transaction().id,
                files = failed_paths.len(),
                "{message}"
            );
            self.emit(UploadEvent::Failed {
                message: message.clone(),
                paths: failed_paths.clone(),
            });
        }

        let status = if cancelled {
            UploadStatus::Cancelled
        } else if finalize_error.is_some() {
            UploadStatus::FinalizeFailed
        } else if !failed_paths.is_empty() {
            UploadStatus::CompletedWithFailures
        } else {
            UploadStatus::Completed
        };

        for action in self.coordinator.finish() {
            if let Action::Transition(state) = action {
                self.emit(UploadEvent::StateChanged(state));
            }
        }

        let tx = self.coordinator.transaction();
        info!(
            transaction = %tx.id,
            status = ?status,
            uploaded_chunks = tx.uploaded_chunks,
            total_chunks = self.coordinator.total_chunks(),
            "upload done"
        );

        UploadOutcome {
            transaction_id: tx.id.clone(),
            status,
            uploaded_chunks: tx.uploaded_chunks,
            uploaded_bytes: tx.uploaded_size,
            total_chunks: self.coordinator.total_chunks(),
            failed_paths,
            failure_message,
            finalize_error,
            nodes: std::mem::take(&mut self.nodes),
        }
    }

    fn emit(&mut self, event: UploadEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped_events += 1;
                if self.dropped_events == 1 {
                    warn!(
                        transaction = %self.coordinator.transaction().id,
                        "event channel full, dropping events"
                    );
                }
                debug!(event = ?event, "event dropped");
            }
        }
    }
}
