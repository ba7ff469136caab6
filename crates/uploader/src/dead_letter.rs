//! Per-chunk failure bookkeeping.
//!
//! Retries are immediate: a failed chunk goes straight back out in the slot
//! it already holds. Once a chunk has failed more than `max_retries` times
//! it is abandoned and its file path is recorded for the final report.

use std::collections::{BTreeSet, HashMap};

use chunkload_transfer::{ChunkDescriptor, ChunkKey};

/// What to do with a chunk that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send it again; `attempt` is the number of failures so far.
    Retry { attempt: u32 },
    /// Give up after `attempts` failures.
    Abandon { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct DeadLetterRecord {
    pub attempts: u32,
    pub chunk: ChunkDescriptor,
}

#[derive(Debug)]
pub struct DeadLetterHandler {
    records: HashMap<ChunkKey, DeadLetterRecord>,
    abandoned: BTreeSet<ChunkKey>,
    failed_paths: BTreeSet<String>,
    max_retries: u32,
}

impl DeadLetterHandler {
    pub fn new(max_retries: u32) -> Self {
        Self {
            records: HashMap::new(),
            abandoned: BTreeSet::new(),
            failed_paths: BTreeSet::new(),
            max_retries,
        }
    }

    /// Records a failed attempt for `chunk` and decides whether to retry.
    pub fn on_failure(&mut self, chunk: &ChunkDescriptor) -> RetryDecision {
        let key = chunk.key();
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| DeadLetterRecord {
                attempts: 0,
                chunk: chunk.clone(),
            });
        record.attempts += 1;
        let attempts = record.attempts;

        if attempts <= self.max_retries {
            return RetryDecision::Retry { attempt: attempts };
        }

        self.records.remove(&key);
        self.failed_paths.insert(key.file_path.clone());
        self.abandoned.insert(key);
        RetryDecision::Abandon { attempts }
    }

    /// Forgets the failure history of a chunk that finally went through.
    pub fn on_success(&mut self, key: &ChunkKey) {
        self.records.remove(key);
    }

    pub fn record(&self, key: &ChunkKey) -> Option<&DeadLetterRecord> {
        self.records.get(key)
    }

    pub fn is_abandoned(&self, key: &ChunkKey) -> bool {
        self.abandoned.contains(key)
    }

    pub fn abandoned_count(&self) -> usize {
        self.abandoned.len()
    }

    /// Sorted, de-duplicated paths of files with at least one abandoned chunk.
    pub fn failed_paths(&self) -> Vec<String> {
        self.failed_paths.iter().cloned().collect()
    }

    /// One message covering every permanently failed file, if there are any.
    pub fn aggregated_message(&self) -> Option<String> {
        if self.failed_paths.is_empty() {
            return None;
        }
        let paths: Vec<&str> = self.failed_paths.iter().map(String::as_str).collect();
        Some(format!(
            "Failed to upload {} file(s): {}",
            paths.len(),
            paths.join(", ")
        ))
    }
}
