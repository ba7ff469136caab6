//! Pending-chunk queue and the bounded in-flight set it feeds.

use std::collections::{HashMap, VecDeque};

use chunkload_transfer::{ChunkDescriptor, ChunkKey};
use tracing::warn;

/// Ordered list of chunks waiting for a transmission slot.
///
/// Up to `stage_target` descriptors sit in the staged window, the rest wait
/// in the backlog; dispatch always takes from the front of the window and
/// tops it up from the backlog, so order is preserved.
///
/// The window is bookkeeping only. Descriptors hold no chunk bytes; workers
/// read each chunk when they transmit it, so staging never reads ahead.
#[derive(Debug)]
pub struct WorkQueue {
    staged: VecDeque<ChunkDescriptor>,
    backlog: VecDeque<ChunkDescriptor>,
    stage_target: usize,
}

impl WorkQueue {
    pub fn new(stage_target: usize) -> Self {
        Self {
            staged: VecDeque::with_capacity(stage_target),
            backlog: VecDeque::new(),
            stage_target: stage_target.max(1),
        }
    }

    pub fn enqueue(&mut self, chunk: ChunkDescriptor) {
        self.backlog.push_back(chunk);
        self.restage();
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = ChunkDescriptor>) {
        self.backlog.extend(chunks);
        self.restage();
    }

    /// Takes the next chunk to transmit, if any.
    pub fn dequeue_for_dispatch(&mut self) -> Option<ChunkDescriptor> {
        let next = self.staged.pop_front();
        self.restage();
        next
    }

    pub fn len(&self) -> usize {
        self.staged.len() + self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.backlog.is_empty()
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Drops every pending chunk.
    pub fn clear(&mut self) {
        self.staged.clear();
        self.backlog.clear();
    }

    fn restage(&mut self) {
        while self.staged.len() < self.stage_target {
            match self.backlog.pop_front() {
                Some(chunk) => self.staged.push_back(chunk),
                None => break,
            }
        }
    }
}

/// Chunks currently being transmitted, at most `max_concurrency` at a time.
#[derive(Debug)]
pub struct InFlightTracker {
    slots: HashMap<ChunkKey, ChunkDescriptor>,
    max_concurrency: usize,
    peak: usize,
}

impl InFlightTracker {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(max_concurrency),
            max_concurrency: max_concurrency.max(1),
            peak: 0,
        }
    }

    /// Moves chunks from `queue` into free slots and returns them for dispatch.
    ///
    /// Every returned chunk is marked `processed`. A chunk that was already
    /// processed, or whose key is already in flight, is dropped instead of
    /// being sent twice.
    pub fn try_fill_slots(&mut self, queue: &mut WorkQueue) -> Vec<ChunkDescriptor> {
        let mut dispatched = Vec::new();

        while self.slots.len() < self.max_concurrency {
            let Some(mut chunk) = queue.dequeue_for_dispatch() else {
                break;
            };
            let key = chunk.key();
            if chunk.processed || self.slots.contains_key(&key) {
                warn!(chunk = %key, "skipping chunk that was already dispatched");
                continue;
            }

            chunk.processed = true;
            self.slots.insert(key, chunk.clone());
            dispatched.push(chunk);
        }

        self.peak = self.peak.max(self.slots.len());
        dispatched
    }

    /// Frees the slot held by `key`.
    pub fn resolve(&mut self, key: &ChunkKey) -> Option<ChunkDescriptor> {
        self.slots.remove(key)
    }

    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Highest number of chunks ever in flight at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
