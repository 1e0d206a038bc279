use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::plan::{ByteRange, ChunkPlan};

/// Lifecycle of one file submitted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferState {
    /// Created; resume queries still outstanding.
    Initializing,
    /// File already exists at the destination; nothing to upload.
    Skipped,
    /// No prior server-side progress; starting from chunk 0.
    ReadyToStart,
    /// Server holds some chunks; starting from the resume point.
    ReadyToResume,
    /// Chunk uploads in flight.
    Transferring,
    /// A transient failure occurred; retries pending.
    Interrupted,
    /// Every chunk acknowledged.
    Complete,
    /// Terminal failure; no further chunks will be sent.
    Failed,
}

impl TransferState {
    /// Terminal states: the file leaves the active set.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Complete | Self::Failed)
    }
}

/// Why a transfer ended in [`TransferState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailReason {
    /// A chunk exhausted its retry budget.
    RetriesExhausted,
    /// The server rejected a chunk with a non-retryable status.
    Rejected(u16),
    /// The local file could not be read.
    SourceUnreadable,
}

/// One unit of upload work: a single chunk of a single file.
///
/// Owned exclusively by the scheduler's pending/in-flight bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub file_id: String,
    pub chunk_index: u32,
    pub range: ByteRange,
    /// Retries already spent on this chunk (0 on first dispatch).
    pub attempt: u32,
}

/// The authoritative record for one file being uploaded.
///
/// Completion is detected from the set of acknowledged chunk indices
/// reaching `total_chunks`, never from arrival order. Acknowledging the
/// same index twice is a no-op, so duplicate server responses cannot
/// double-count bytes or re-fire completion.
#[derive(Debug)]
pub struct FileTransfer {
    id: String,
    name: String,
    plan: ChunkPlan,
    resume_chunk_index: u32,
    bytes_accounted_for: u64,
    state: TransferState,
    attempts: HashMap<u32, u32>,
    acked: HashSet<u32>,
    fail_reason: Option<FailReason>,
}

impl FileTransfer {
    /// Creates a transfer in [`TransferState::Initializing`].
    pub fn new(id: impl Into<String>, name: impl Into<String>, total_size: u64, chunk_size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plan: ChunkPlan::new(total_size, chunk_size),
            resume_chunk_index: 0,
            bytes_accounted_for: 0,
            state: TransferState::Initializing,
            attempts: HashMap::new(),
            acked: HashSet::new(),
            fail_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn total_size(&self) -> u64 {
        self.plan.total_size()
    }

    pub fn total_chunks(&self) -> u32 {
        self.plan.total_chunks()
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn fail_reason(&self) -> Option<FailReason> {
        self.fail_reason
    }

    pub fn resume_chunk_index(&self) -> u32 {
        self.resume_chunk_index
    }

    pub fn bytes_accounted_for(&self) -> u64 {
        self.bytes_accounted_for
    }

    /// Upload progress in percent, for display only.
    pub fn percent(&self) -> f64 {
        if self.plan.total_size() == 0 {
            return if self.is_complete() { 100.0 } else { 0.0 };
        }
        self.bytes_accounted_for as f64 / self.plan.total_size() as f64 * 100.0
    }

    /// Marks the file skipped: the server already has it in full.
    pub fn mark_skipped(&mut self) {
        self.state = TransferState::Skipped;
    }

    /// Declares the file fresh: no prior server-side progress.
    pub fn mark_fresh(&mut self) {
        self.state = TransferState::ReadyToStart;
    }

    /// Applies a resume point: chunks `[0, from_chunk)` are already
    /// stored server-side and are treated as acknowledged. `from_chunk`
    /// is clamped to the total chunk count. If everything is already
    /// stored the transfer completes immediately.
    pub fn apply_resume(&mut self, from_chunk: u32) {
        let from = from_chunk.min(self.plan.total_chunks());
        self.resume_chunk_index = from;
        for index in 0..from {
            self.ack_chunk(index);
        }
        if !self.is_complete() {
            self.state = if from > 0 {
                TransferState::ReadyToResume
            } else {
                TransferState::ReadyToStart
            };
        }
    }

    /// Records that a chunk is in flight.
    pub fn mark_transferring(&mut self) {
        if !self.state.is_terminal() {
            self.state = TransferState::Transferring;
        }
    }

    /// Records a transient failure awaiting retry.
    pub fn mark_interrupted(&mut self) {
        if !self.state.is_terminal() {
            self.state = TransferState::Interrupted;
        }
    }

    /// Acknowledges chunk `index`. Returns `true` only the first time an
    /// index is acknowledged; duplicates change nothing.
    pub fn ack_chunk(&mut self, index: u32) -> bool {
        let Some(range) = self.plan.range(index) else {
            return false;
        };
        if !self.acked.insert(index) {
            return false;
        }
        self.bytes_accounted_for += range.len;
        if self.acked.len() as u32 == self.plan.total_chunks() {
            self.state = TransferState::Complete;
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.state == TransferState::Complete
    }

    pub fn is_acked(&self, index: u32) -> bool {
        self.acked.contains(&index)
    }

    /// Retries already spent on chunk `index`.
    pub fn retries(&self, index: u32) -> u32 {
        self.attempts.get(&index).copied().unwrap_or(0)
    }

    /// Spends one retry on chunk `index` and returns the new count.
    pub fn record_retry(&mut self, index: u32) -> u32 {
        let count = self.attempts.entry(index).or_insert(0);
        *count += 1;
        *count
    }

    /// Moves the file to a terminal failure.
    pub fn fail(&mut self, reason: FailReason) {
        self.state = TransferState::Failed;
        self.fail_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(total: u64, chunk: u64) -> FileTransfer {
        FileTransfer::new("t1", "file.bin", total, chunk)
    }

    #[test]
    fn new_transfer_is_initializing() {
        let t = transfer(10, 4);
        assert_eq!(t.state(), TransferState::Initializing);
        assert_eq!(t.total_chunks(), 3);
        assert_eq!(t.bytes_accounted_for(), 0);
        assert_eq!(t.resume_chunk_index(), 0);
    }

    #[test]
    fn ack_out_of_order_completes() {
        let mut t = transfer(10, 4);
        t.mark_fresh();
        assert!(t.ack_chunk(2));
        assert!(t.ack_chunk(0));
        assert!(!t.is_complete());
        assert!(t.ack_chunk(1));
        assert!(t.is_complete());
        assert_eq!(t.bytes_accounted_for(), 10);
    }

    #[test]
    fn duplicate_ack_is_noop() {
        let mut t = transfer(10, 4);
        t.mark_fresh();
        assert!(t.ack_chunk(0));
        assert!(!t.ack_chunk(0));
        assert_eq!(t.bytes_accounted_for(), 4);

        t.ack_chunk(1);
        t.ack_chunk(2);
        assert!(t.is_complete());
        // Duplicate after completion changes nothing.
        assert!(!t.ack_chunk(2));
        assert_eq!(t.bytes_accounted_for(), 10);
        assert_eq!(t.state(), TransferState::Complete);
    }

    #[test]
    fn ack_unknown_index_ignored() {
        let mut t = transfer(10, 4);
        assert!(!t.ack_chunk(99));
        assert_eq!(t.bytes_accounted_for(), 0);
    }

    #[test]
    fn apply_resume_accounts_stored_chunks() {
        let mut t = transfer(10, 4);
        t.apply_resume(2);
        assert_eq!(t.state(), TransferState::ReadyToResume);
        assert_eq!(t.resume_chunk_index(), 2);
        assert_eq!(t.bytes_accounted_for(), 8);
        assert!(t.is_acked(0));
        assert!(t.is_acked(1));
        assert!(!t.is_acked(2));

        assert!(t.ack_chunk(2));
        assert!(t.is_complete());
        assert_eq!(t.bytes_accounted_for(), 10);
    }

    #[test]
    fn apply_resume_clamps_and_may_complete() {
        let mut t = transfer(10, 4);
        // Server claims more chunks than exist; clamp to 3 and complete.
        t.apply_resume(7);
        assert_eq!(t.resume_chunk_index(), 3);
        assert!(t.is_complete());
        assert_eq!(t.bytes_accounted_for(), 10);
    }

    #[test]
    fn apply_resume_zero_is_fresh() {
        let mut t = transfer(10, 4);
        t.apply_resume(0);
        assert_eq!(t.state(), TransferState::ReadyToStart);
    }

    #[test]
    fn retry_counts_per_chunk() {
        let mut t = transfer(10, 4);
        assert_eq!(t.retries(1), 0);
        assert_eq!(t.record_retry(1), 1);
        assert_eq!(t.record_retry(1), 2);
        assert_eq!(t.retries(1), 2);
        // Other chunks unaffected.
        assert_eq!(t.retries(0), 0);
    }

    #[test]
    fn fail_is_terminal_and_keeps_acks() {
        let mut t = transfer(10, 4);
        t.mark_fresh();
        t.ack_chunk(0);
        t.fail(FailReason::RetriesExhausted);
        assert_eq!(t.state(), TransferState::Failed);
        assert!(t.state().is_terminal());
        assert_eq!(t.fail_reason(), Some(FailReason::RetriesExhausted));
        // Acknowledged chunks are not un-done.
        assert!(t.is_acked(0));
        assert_eq!(t.bytes_accounted_for(), 4);
        // Terminal state sticks.
        t.mark_transferring();
        assert_eq!(t.state(), TransferState::Failed);
    }

    #[test]
    fn percent_tracks_bytes() {
        let mut t = transfer(10, 4);
        t.mark_fresh();
        assert_eq!(t.percent(), 0.0);
        t.ack_chunk(0);
        assert!((t.percent() - 40.0).abs() < f64::EPSILON);
        t.ack_chunk(1);
        t.ack_chunk(2);
        assert!((t.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_byte_file_completes_on_single_ack() {
        let mut t = transfer(0, 4);
        t.mark_fresh();
        assert_eq!(t.total_chunks(), 1);
        assert_eq!(t.percent(), 0.0);
        assert!(t.ack_chunk(0));
        assert!(t.is_complete());
        assert_eq!(t.percent(), 100.0);
    }
}
