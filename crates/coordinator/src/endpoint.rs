//! Transport boundary.
//!
//! `UploadEndpoint` is implemented by the application on top of its
//! actual HTTP client. Using a trait keeps the coordinator decoupled
//! from transport and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use uplink_protocol::ChunkUploadFields;
use uplink_transfer::UploadError;

/// Boxed future returned by endpoint methods, so the trait stays
/// object-safe.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Abstract connection to the chunk-storage server.
///
/// All three operations are safe to repeat: the checkpoint and status
/// lookups are reads, and the server stores chunks idempotently by
/// `(transfer id, chunk index)`, so re-sending a chunk after an
/// ambiguous failure cannot corrupt the merge.
pub trait UploadEndpoint: Send + Sync {
    /// `POST /upload/checkpoint` — does the complete file already exist
    /// at `destination`?
    fn checkpoint(&self, filename: &str, destination: &str) -> EndpointFuture<'_, bool>;

    /// `GET /upload/status` — how many chunks does the server already
    /// hold for this transfer?
    fn chunk_status(&self, transfer_id: &str) -> EndpointFuture<'_, u64>;

    /// `POST /upload/` — uploads one chunk's bytes with its form fields.
    fn upload_chunk(&self, fields: &ChunkUploadFields, data: &[u8]) -> EndpointFuture<'_, ()>;
}
