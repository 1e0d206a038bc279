use tracing::{debug, warn};
use uplink_transfer::ChunkPlan;

use crate::endpoint::UploadEndpoint;

/// Where to start uploading, derived from server-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// The complete file already exists at the destination; skip it and
    /// create no chunk tasks.
    AlreadyComplete,
    /// The server holds chunks `[0, from_chunk)`; upload the rest.
    Resume { from_chunk: u32, bytes_stored: u64 },
    /// No prior state; start from chunk 0.
    Fresh,
}

/// Queries the server for prior progress on a file.
///
/// Checkpoint first (whole-file short-circuit), then chunk status for a
/// partial resume. Both queries are an optimization only: if either
/// fails, the decision degrades to [`ResumeDecision::Fresh`] so the
/// upload makes forward progress regardless. Re-sending chunks the
/// server already holds is safe because the server-side merge is
/// idempotent per chunk index.
pub async fn resolve(
    endpoint: &dyn UploadEndpoint,
    filename: &str,
    destination: &str,
    transfer_id: &str,
    plan: &ChunkPlan,
) -> ResumeDecision {
    match endpoint.checkpoint(filename, destination).await {
        Ok(true) => {
            debug!(file = filename, "checkpoint hit, file already at destination");
            return ResumeDecision::AlreadyComplete;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(file = filename, error = %e, "checkpoint query failed, starting fresh");
            return ResumeDecision::Fresh;
        }
    }

    match endpoint.chunk_status(transfer_id).await {
        Ok(0) => ResumeDecision::Fresh,
        Ok(uploaded) => {
            let from_chunk = uploaded.min(u64::from(plan.total_chunks())) as u32;
            let bytes_stored = plan.bytes_before(from_chunk);
            debug!(
                file = filename,
                from_chunk, bytes_stored, "resuming from server-side chunk status"
            );
            ResumeDecision::Resume {
                from_chunk,
                bytes_stored,
            }
        }
        Err(e) => {
            warn!(file = filename, error = %e, "chunk status query failed, starting fresh");
            ResumeDecision::Fresh
        }
    }
}
