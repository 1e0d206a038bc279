use serde::{Deserialize, Serialize};

/// Body of `POST /upload/checkpoint`: asks whether the full file already
/// exists at the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub filename: String,
    pub path: String,
}

/// Response to a checkpoint lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to `GET /upload/status?uuid=...`: how many chunks the server
/// already holds for this transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatusResponse {
    #[serde(default)]
    pub uploaded_chunks: u64,
}

/// Multipart form fields sent alongside the chunk bytes on
/// `POST /upload/`. The `dz`-prefixed names are what the server parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUploadFields {
    #[serde(rename = "dzuuid")]
    pub transfer_id: String,
    #[serde(rename = "dzchunkindex")]
    pub chunk_index: u32,
    #[serde(rename = "dztotalchunkcount")]
    pub total_chunks: u32,
    pub destination: String,
    /// SHA-256 hex digest of the chunk bytes. The server ignores unknown
    /// fields, so this is safe to send even to older deployments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Server-side outcome of a chunk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkUploadStatus {
    /// Chunk stored; more chunks outstanding.
    Ok,
    /// Final chunk received and the merge was queued.
    CompleteQueued,
    /// Final chunk received but earlier chunks are missing; the client
    /// must resume. Sent with HTTP 409.
    ResumeRequired,
}

/// Response body of `POST /upload/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub status: ChunkUploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_chunks: Option<u64>,
}
