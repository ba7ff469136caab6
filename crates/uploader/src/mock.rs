//! Scripted in-memory transport for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use chunkload_protocol::{
    ChunkUploadRequest, CompleteTransactionRequest, CompleteTransactionResponse,
    FinalizeOperation, RemoteNode, UploadOperation,
};

use crate::error::TransportError;
use crate::transport::{TransportFuture, UploadTransport};

/// How the mock answers one attempt at a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Ok,
    Fail,
    Hang,
    Panic,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub operation: UploadOperation,
    pub request: ChunkUploadRequest,
    pub data_len: usize,
}

/// Transmission boundary observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogEntry {
    Start(String, u32),
    End(String, u32),
}

pub(crate) struct MockTransport {
    script: Mutex<HashMap<(String, u32), VecDeque<Behavior>>>,
    always_fail: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    log: Mutex<Vec<LogEntry>>,
    finalize_calls: Mutex<Vec<(FinalizeOperation, CompleteTransactionRequest)>>,
    finalize_response: Mutex<Result<CompleteTransactionResponse, TransportError>>,
    hang_all: Mutex<bool>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct Active<'a>(&'a AtomicUsize);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            always_fail: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            finalize_calls: Mutex::new(Vec::new()),
            finalize_response: Mutex::new(Ok(CompleteTransactionResponse {
                success: true,
                message: None,
            })),
            hang_all: Mutex::new(false),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Answers the next attempts at `filepath#index` with `behaviors`, then `Ok`.
    pub fn script(&self, filepath: &str, index: u32, behaviors: impl IntoIterator<Item = Behavior>) {
        self.script
            .lock()
            .unwrap()
            .entry((filepath.to_string(), index))
            .or_default()
            .extend(behaviors);
    }

    /// Every chunk of `filepath` fails, on every attempt.
    pub fn fail_always(&self, filepath: &str) {
        self.always_fail.lock().unwrap().insert(filepath.to_string());
    }

    /// Every chunk hangs until dropped.
    pub fn hang_all(&self) {
        *self.hang_all.lock().unwrap() = true;
    }

    pub fn set_finalize_response(&self, response: Result<CompleteTransactionResponse, TransportError>) {
        *self.finalize_response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, filepath: &str, index: u32) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.filepath == filepath && c.request.chunk.chunk_index == index)
            .count()
    }

    pub fn log(&self) -> Vec<LogEntry> {
        self.log.lock().unwrap().clone()
    }

    pub fn finalize_calls(&self) -> Vec<(FinalizeOperation, CompleteTransactionRequest)> {
        self.finalize_calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, filepath: &str, index: u32) -> Behavior {
        if *self.hang_all.lock().unwrap() {
            return Behavior::Hang;
        }
        if self.always_fail.lock().unwrap().contains(filepath) {
            return Behavior::Fail;
        }
        self.script
            .lock()
            .unwrap()
            .get_mut(&(filepath.to_string(), index))
            .and_then(VecDeque::pop_front)
            .unwrap_or(Behavior::Ok)
    }
}

impl UploadTransport for MockTransport {
    fn upload_chunk(
        &self,
        operation: UploadOperation,
        request: ChunkUploadRequest,
        data: Bytes,
    ) -> TransportFuture<'_, Option<RemoteNode>> {
        Box::pin(async move {
            let path = request.filepath.clone();
            let index = request.chunk.chunk_index;
            let behavior = self.next_behavior(&path, index);

            self.calls.lock().unwrap().push(RecordedCall {
                operation,
                request: request.clone(),
                data_len: data.len(),
            });
            self.log.lock().unwrap().push(LogEntry::Start(path.clone(), index));

            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _active = Active(&self.current);

            tokio::task::yield_now().await;

            let result = match behavior {
                Behavior::Ok => Ok(request.is_last_chunk().then(|| RemoteNode {
                    id: format!("node-{}", request.chunk.upload_id),
                    key: path.clone(),
                    size: 0,
                    is_dir: false,
                    modified_at: None,
                })),
                Behavior::Fail => Err(TransportError::Connection("scripted failure".into())),
                Behavior::Hang => std::future::pending().await,
                Behavior::Panic => panic!("scripted panic"),
            };

            self.log.lock().unwrap().push(LogEntry::End(path, index));
            result
        })
    }

    fn complete_transaction(
        &self,
        operation: FinalizeOperation,
        request: CompleteTransactionRequest,
    ) -> TransportFuture<'_, CompleteTransactionResponse> {
        Box::pin(async move {
            self.finalize_calls.lock().unwrap().push((operation, request));
            self.finalize_response.lock().unwrap().clone()
        })
    }
}
