//! Wire types for the chunked-upload HTTP endpoints.
//!
//! The server exposes three endpoints the coordinator talks to:
//! a whole-file checkpoint lookup, a per-transfer chunk-status lookup,
//! and the chunk upload itself. Field names match the server's wire
//! format exactly (including the `dz`-prefixed multipart field names
//! inherited from the legacy web client).

mod types;

pub use types::{
    CheckpointRequest, CheckpointResponse, ChunkStatusResponse, ChunkUploadFields,
    ChunkUploadResponse, ChunkUploadStatus,
};
