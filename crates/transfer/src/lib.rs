//! Pure chunked-transfer logic: chunk planning, on-demand chunk reads
//! with checksums, the per-file transfer record, and the retry policy.
//!
//! Nothing here does network I/O; the coordinator crate drives these
//! types against an actual endpoint.

mod plan;
mod retry;
mod source;
mod types;

pub use plan::{ByteRange, ChunkPlan};
pub use retry::{FailureClass, RetryDecision, RetryPolicy, UploadError};
pub use source::{Chunk, ChunkSource, checksum_bytes};
pub use types::{ChunkTask, FailReason, FileTransfer, TransferState};

/// Default chunk size: 16 MiB.
///
/// Matches the server's expected chunking granularity. Larger chunks
/// reduce per-chunk overhead (requests, checksums) at the cost of more
/// re-sent bytes when a chunk fails.
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk index {index} out of range (total {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("file size changed: planned {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}
