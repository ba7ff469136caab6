//! Completion coordinator for one upload transaction.
//!
//! A synchronous state machine: it owns the work queue, the in-flight set
//! and the dead-letter handler, consumes chunk resolutions and answers with
//! [`Action`]s for the async driver to carry out. Nothing here awaits, so
//! the scheduling rules can be exercised without a runtime.
//!
//! ```text
//! Planning -> Uploading -> DrainingLastChunks -> Finalizing -> Done
//! ```
//!
//! Each file's last chunk is held back until every immediate chunk has
//! resolved, so it never reaches the remote side before the rest of its
//! file.

use std::fmt;

use chunkload_protocol::RemoteNode;
use chunkload_transfer::{ChunkDescriptor, ProgressReporter, ProgressUpdate, TransferError};
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::dead_letter::{DeadLetterHandler, RetryDecision};
use crate::queue::{InFlightTracker, WorkQueue};
use crate::types::UploadTransaction;
use crate::worker::TransmitResult;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    Planning,
    Uploading,
    DrainingLastChunks,
    Finalizing,
    Done,
}

impl UploadState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Uploading => "uploading",
            Self::DrainingLastChunks => "draining_last_chunks",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }

    /// Chunks are only accepted and dispatched in these states.
    fn is_transferring(self) -> bool {
        matches!(self, Self::Uploading | Self::DrainingLastChunks)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work the driver must perform, in order.
#[derive(Debug, Clone)]
pub enum Action {
    /// Hand the chunk to a worker.
    Dispatch(ChunkDescriptor),
    Progress(ProgressUpdate),
    NodeCreated(RemoteNode),
    Transition(UploadState),
    /// Call the remote finalize operation. Emitted at most once.
    Finalize { cancel: bool },
}

pub struct Coordinator {
    transaction: UploadTransaction,
    state: UploadState,
    chunk_size: u64,
    queue: WorkQueue,
    in_flight: InFlightTracker,
    dead_letter: DeadLetterHandler,
    deferred: Vec<ChunkDescriptor>,
    progress: ProgressReporter,
    total_chunks: usize,
    cancelled: bool,
}

impl Coordinator {
    pub fn new(
        transaction: UploadTransaction,
        config: &UploaderConfig,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            transaction,
            state: UploadState::Planning,
            chunk_size: config.chunk_size,
            queue: WorkQueue::new(config.stage_target()),
            in_flight: InFlightTracker::new(config.max_concurrency),
            dead_letter: DeadLetterHandler::new(config.max_retries),
            deferred: Vec::new(),
            progress,
            total_chunks: 0,
            cancelled: false,
        }
    }

    /// Plans every chunk and fills the first round of slots.
    ///
    /// Does nothing if called again after planning.
    pub fn start(&mut self) -> Result<Vec<Action>, TransferError> {
        let mut actions = Vec::new();
        if self.state != UploadState::Planning {
            return Ok(actions);
        }

        let plan = chunkload_transfer::plan(&self.transaction.files, self.chunk_size)?;
        self.total_chunks = plan.total_chunks;
        info!(
            transaction = %self.transaction.id,
            files = self.transaction.total_files,
            total_chunks = plan.total_chunks,
            deferred = plan.deferred.len(),
            "planning done"
        );
        self.queue.extend(plan.immediate);
        self.deferred = plan.deferred;

        self.transition(UploadState::Uploading, &mut actions);
        self.fill_slots(&mut actions);
        self.check_completion(&mut actions);
        Ok(actions)
    }

    /// Applies the result of one transmission attempt.
    ///
    /// Resolutions arriving after finalization started, or for chunks that
    /// are not in flight, are ignored.
    pub fn on_resolved(&mut self, chunk: ChunkDescriptor, result: TransmitResult) -> Vec<Action> {
        let mut actions = Vec::new();
        let key = chunk.key();

        if !self.state.is_transferring() || !self.in_flight.contains(&key) {
            debug!(
                transaction = %self.transaction.id,
                chunk = %key,
                state = %self.state,
                "ignoring stale chunk resolution"
            );
            return actions;
        }

        match result {
            TransmitResult::Success { node } => {
                self.in_flight.resolve(&key);
                self.dead_letter.on_success(&key);
                self.transaction.uploaded_chunks += 1;
                self.transaction.uploaded_size += chunk.len();
                debug!(
                    transaction = %self.transaction.id,
                    file = %key.file_path,
                    chunk = key.chunk_index,
                    uploaded = self.transaction.uploaded_chunks,
                    "chunk uploaded"
                );

                let update = self.progress.report(
                    self.transaction.uploaded_chunks,
                    self.total_chunks,
                    self.transaction.total_files,
                    self.transaction.uploaded_size,
                    self.transaction.total_size,
                );
                actions.push(Action::Progress(update));
                if let Some(node) = node {
                    actions.push(Action::NodeCreated(node));
                }
            }
            TransmitResult::Failed { reason } => match self.dead_letter.on_failure(&chunk) {
                RetryDecision::Retry { attempt } => {
                    warn!(
                        transaction = %self.transaction.id,
                        file = %key.file_path,
                        chunk = key.chunk_index,
                        attempt,
                        reason = %reason,
                        "chunk failed, retrying"
                    );
                    // Same slot, straight back out.
                    actions.push(Action::Dispatch(chunk));
                    return actions;
                }
                RetryDecision::Abandon { attempts } => {
                    warn!(
                        transaction = %self.transaction.id,
                        file = %key.file_path,
                        chunk = key.chunk_index,
                        attempts,
                        reason = %reason,
                        "chunk abandoned"
                    );
                    self.in_flight.resolve(&key);
                }
            },
        }

        self.fill_slots(&mut actions);
        self.check_completion(&mut actions);
        actions
    }

    /// Stops dispatching and asks for a cancelling finalize.
    pub fn cancel(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if matches!(self.state, UploadState::Finalizing | UploadState::Done) {
            return actions;
        }

        info!(
            transaction = %self.transaction.id,
            in_flight = self.in_flight.len(),
            queued = self.queue.len(),
            "upload cancelled"
        );
        self.cancelled = true;
        self.queue.clear();
        self.in_flight.clear();
        self.deferred.clear();
        self.transition(UploadState::Finalizing, &mut actions);
        actions.push(Action::Finalize { cancel: true });
        actions
    }

    /// Marks the transaction done once finalization returned.
    pub fn finish(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state != UploadState::Done {
            self.transition(UploadState::Done, &mut actions);
        }
        actions
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn transaction(&self) -> &UploadTransaction {
        &self.transaction
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn failed_paths(&self) -> Vec<String> {
        self.dead_letter.failed_paths()
    }

    pub fn failure_message(&self) -> Option<String> {
        self.dead_letter.aggregated_message()
    }

    fn fill_slots(&mut self, actions: &mut Vec<Action>) {
        for chunk in self.in_flight.try_fill_slots(&mut self.queue) {
            debug!(
                transaction = %self.transaction.id,
                file = %chunk.file_path(),
                chunk = chunk.chunk_index,
                deferred = chunk.is_deferred,
                "dispatching chunk"
            );
            actions.push(Action::Dispatch(chunk));
        }
    }

    fn check_completion(&mut self, actions: &mut Vec<Action>) {
        if !self.queue.is_empty() || !self.in_flight.is_empty() {
            return;
        }

        if self.state == UploadState::Uploading && !self.deferred.is_empty() {
            info!(
                transaction = %self.transaction.id,
                last_chunks = self.deferred.len(),
                "promoting last chunks"
            );
            self.queue.extend(std::mem::take(&mut self.deferred));
            self.transition(UploadState::DrainingLastChunks, actions);
            self.fill_slots(actions);
            return;
        }

        self.transition(UploadState::Finalizing, actions);
        actions.push(Action::Finalize { cancel: false });
    }

    fn transition(&mut self, next: UploadState, actions: &mut Vec<Action>) {
        info!(
            transaction = %self.transaction.id,
            from = %self.state,
            to = %next,
            "state changed"
        );
        self.state = next;
        actions.push(Action::Transition(next));
    }
}
