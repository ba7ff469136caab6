//! Remote collection service trait.
//!
//! The application implements `UploadTransport` on top of whatever client
//! talks to the service. Upload logic only sees this trait, which keeps it
//! testable with scripted mocks.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use chunkload_protocol::{
    ChunkUploadRequest, CompleteTransactionRequest, CompleteTransactionResponse,
    FinalizeOperation, RemoteNode, UploadOperation,
};

use crate::error::TransportError;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

pub trait UploadTransport: Send + Sync {
    /// Sends one chunk.
    ///
    /// Resolves to the created node when the service finished assembling the
    /// file, which normally happens on the file's last chunk.
    fn upload_chunk(
        &self,
        operation: UploadOperation,
        request: ChunkUploadRequest,
        data: Bytes,
    ) -> TransportFuture<'_, Option<RemoteNode>>;

    /// Commits (or, with `cancel`/`rollback` set, discards) a transaction.
    fn complete_transaction(
        &self,
        operation: FinalizeOperation,
        request: CompleteTransactionRequest,
    ) -> TransportFuture<'_, CompleteTransactionResponse>;
}
