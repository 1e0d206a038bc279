//! Deterministic scheduling core.
//!
//! `SchedulerCore` is a plain state machine: the async driver feeds it
//! task results and commands, and drains the actions (dispatches, retry
//! timers) and status events it produces. Keeping it synchronous means
//! every invariant — concurrency ceiling, skip-by-construction, retry
//! bound, idempotent completion — is testable without timing.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uplink_transfer::{
    ChunkPlan, ChunkTask, FailReason, FailureClass, FileTransfer, RetryDecision, RetryPolicy,
    TransferState, UploadError,
};

use crate::config::UploaderConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::events::UploadEvent;
use crate::resume::ResumeDecision;

/// Work the driver must perform on the scheduler's behalf.
#[derive(Debug, Clone)]
pub enum SchedulerAction {
    /// Spawn an upload for this chunk.
    Dispatch(ChunkTask),
    /// Arm a timer; when it fires, feed `retry_due` back in.
    ArmRetry {
        file_id: String,
        chunk_index: u32,
        delay: Duration,
    },
}

/// Everything the driver needs to run a chunk upload for a file.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub path: PathBuf,
    pub destination: String,
    pub plan: ChunkPlan,
    pub cancel: CancellationToken,
}

struct FileSlot {
    transfer: FileTransfer,
    path: PathBuf,
    destination: String,
    /// Chunk indices awaiting dispatch, ascending.
    pending: BTreeSet<u32>,
    /// Chunk indices currently in flight.
    in_flight: HashSet<u32>,
    /// Chunk indices waiting on a retry timer.
    delayed: HashSet<u32>,
    cancel: CancellationToken,
}

/// Drives N files and, within each, M concurrent chunk uploads.
///
/// Invariants:
/// - in-flight chunks across all files never exceed `parallel_uploads`;
/// - chunk indices below the resume point are never constructed;
/// - a file completes exactly once, regardless of acknowledgement order
///   or duplicates;
/// - a failed or cancelled file never blocks its siblings.
pub struct SchedulerCore {
    config: UploaderConfig,
    retry: RetryPolicy,
    /// File dispatch order: first enqueued, first dispatched.
    order: Vec<String>,
    slots: HashMap<String, FileSlot>,
    in_flight_total: usize,
    link: ConnectivityMonitor,
    events: VecDeque<UploadEvent>,
    actions: VecDeque<SchedulerAction>,
    batch_reported: bool,
}

impl SchedulerCore {
    pub fn new(config: UploaderConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            config,
            retry,
            order: Vec::new(),
            slots: HashMap::new(),
            in_flight_total: 0,
            link: ConnectivityMonitor::new(),
            events: VecDeque::new(),
            actions: VecDeque::new(),
            batch_reported: false,
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Adds a file with its resume decision and enqueues its remaining
    /// chunks. Chunks below the resume point are never created.
    pub fn add_file(
        &mut self,
        mut transfer: FileTransfer,
        path: PathBuf,
        destination: String,
        decision: ResumeDecision,
    ) {
        let id = transfer.id().to_string();
        let total = transfer.total_size();
        self.batch_reported = false;

        let mut pending = BTreeSet::new();
        match decision {
            ResumeDecision::AlreadyComplete => {
                transfer.mark_skipped();
                info!(file = transfer.name(), "skipped, already at destination");
                self.events.push_back(UploadEvent::Skipped {
                    file_id: id.clone(),
                    size: total,
                });
            }
            ResumeDecision::Fresh => {
                transfer.mark_fresh();
                self.events.push_back(UploadEvent::ReadyToStart {
                    file_id: id.clone(),
                    size: total,
                });
                pending.extend(0..transfer.total_chunks());
            }
            ResumeDecision::Resume { from_chunk, .. } => {
                transfer.apply_resume(from_chunk);
                if transfer.is_complete() {
                    // Server already holds every chunk.
                    self.events.push_back(UploadEvent::Complete {
                        file_id: id.clone(),
                        size: total,
                    });
                } else {
                    self.events.push_back(UploadEvent::ReadyToResume {
                        file_id: id.clone(),
                        uploaded: transfer.bytes_accounted_for(),
                        total,
                    });
                    pending.extend(transfer.resume_chunk_index()..transfer.total_chunks());
                }
            }
        }

        self.order.push(id.clone());
        self.slots.insert(
            id,
            FileSlot {
                transfer,
                path,
                destination,
                pending,
                in_flight: HashSet::new(),
                delayed: HashSet::new(),
                cancel: CancellationToken::new(),
            },
        );
        self.check_batch();
        self.fill_dispatch();
    }

    /// Registers a file that failed before any chunk could be scheduled
    /// (e.g. an unreadable source), so batch accounting still counts it.
    pub fn add_failed_file(
        &mut self,
        mut transfer: FileTransfer,
        path: PathBuf,
        destination: String,
        reason: FailReason,
    ) {
        let id = transfer.id().to_string();
        self.batch_reported = false;
        transfer.fail(reason);
        warn!(file = transfer.name(), ?reason, "transfer failed before scheduling");
        self.events.push_back(UploadEvent::Failed {
            file_id: id.clone(),
            reason,
        });
        self.order.push(id.clone());
        self.slots.insert(
            id,
            FileSlot {
                transfer,
                path,
                destination,
                pending: BTreeSet::new(),
                in_flight: HashSet::new(),
                delayed: HashSet::new(),
                cancel: CancellationToken::new(),
            },
        );
        self.check_batch();
    }

    /// Drains queued status events.
    pub fn take_events(&mut self) -> Vec<UploadEvent> {
        self.events.drain(..).collect()
    }

    /// Drains queued driver actions.
    pub fn take_actions(&mut self) -> Vec<SchedulerAction> {
        self.actions.drain(..).collect()
    }

    /// Context needed to execute an upload task for `file_id`.
    pub fn task_context(&self, file_id: &str) -> Option<TaskContext> {
        self.slots.get(file_id).map(|slot| TaskContext {
            path: slot.path.clone(),
            destination: slot.destination.clone(),
            plan: *slot.transfer.plan(),
            cancel: slot.cancel.clone(),
        })
    }

    /// Chunk acknowledged by the server.
    ///
    /// Results for cancelled files or failed siblings are discarded.
    /// Duplicate acknowledgements are idempotent no-ops.
    pub fn task_acked(&mut self, file_id: &str, chunk_index: u32) {
        let Some(slot) = self.slots.get_mut(file_id) else {
            return;
        };
        if slot.in_flight.remove(&chunk_index) {
            self.in_flight_total -= 1;
        }
        if slot.transfer.state() == TransferState::Failed {
            // Sibling finished after the file failed; discard.
            self.fill_dispatch();
            return;
        }

        if slot.transfer.ack_chunk(chunk_index) {
            let percent = slot.transfer.percent();
            let total = slot.transfer.total_size();
            self.events.push_back(UploadEvent::Progress {
                file_id: file_id.to_string(),
                percent,
                total,
            });
            if slot.transfer.is_complete() {
                info!(file = slot.transfer.name(), bytes = total, "upload complete");
                self.events.push_back(UploadEvent::Complete {
                    file_id: file_id.to_string(),
                    size: total,
                });
                self.check_batch();
            }
        }
        self.fill_dispatch();
    }

    /// Chunk upload failed. Transient failures go through the retry
    /// policy; permanent ones fail the file.
    pub fn task_failed(&mut self, file_id: &str, chunk_index: u32, error: &UploadError) {
        let Some(slot) = self.slots.get_mut(file_id) else {
            return;
        };
        if slot.in_flight.remove(&chunk_index) {
            self.in_flight_total -= 1;
        }
        if slot.transfer.state().is_terminal() {
            self.fill_dispatch();
            return;
        }

        self.link.note_failure(Instant::now());

        match error.class() {
            FailureClass::Retryable => {
                slot.transfer.mark_interrupted();
                self.events.push_back(UploadEvent::Interrupted {
                    file_id: file_id.to_string(),
                });
                let prior = slot.transfer.retries(chunk_index);
                match self.retry.next_attempt(prior) {
                    RetryDecision::RetryAfter(delay) => {
                        let attempt = slot.transfer.record_retry(chunk_index);
                        slot.delayed.insert(chunk_index);
                        warn!(
                            file = slot.transfer.name(),
                            chunk = chunk_index,
                            attempt,
                            error = %error,
                            "transient failure, retry armed"
                        );
                        self.actions.push_back(SchedulerAction::ArmRetry {
                            file_id: file_id.to_string(),
                            chunk_index,
                            delay,
                        });
                    }
                    RetryDecision::GiveUp => {
                        self.fail_file(file_id, FailReason::RetriesExhausted);
                    }
                }
            }
            FailureClass::Permanent => {
                let reason = match error {
                    UploadError::Status(status) => FailReason::Rejected(*status),
                    // Network/timeout are always retryable; permanent
                    // non-status failures can only be local.
                    _ => FailReason::SourceUnreadable,
                };
                self.fail_file(file_id, reason);
            }
        }
        self.fill_dispatch();
    }

    /// The local file could not be read for this chunk.
    pub fn task_source_failed(&mut self, file_id: &str, chunk_index: u32) {
        let Some(slot) = self.slots.get_mut(file_id) else {
            return;
        };
        if slot.in_flight.remove(&chunk_index) {
            self.in_flight_total -= 1;
        }
        if !slot.transfer.state().is_terminal() {
            self.fail_file(file_id, FailReason::SourceUnreadable);
        }
        self.fill_dispatch();
    }

    /// Retry timer fired: re-enqueue the chunk if the file still wants it.
    pub fn retry_due(&mut self, file_id: &str, chunk_index: u32) {
        let Some(slot) = self.slots.get_mut(file_id) else {
            return;
        };
        if !slot.delayed.remove(&chunk_index) || slot.transfer.state().is_terminal() {
            return;
        }
        slot.pending.insert(chunk_index);
        self.fill_dispatch();
    }

    /// Removes a file before completion: drops its pending work, aborts
    /// its in-flight uploads via the cancellation token, releases their
    /// concurrency slots, and suppresses all further events for it.
    pub fn cancel_file(&mut self, file_id: &str) -> bool {
        let Some(slot) = self.slots.remove(file_id) else {
            return false;
        };
        slot.cancel.cancel();
        self.in_flight_total -= slot.in_flight.len();
        self.order.retain(|id| id != file_id);
        debug!(file = slot.transfer.name(), "transfer cancelled");
        self.check_batch();
        self.fill_dispatch();
        true
    }

    /// Network lost: stop dispatching. In-flight uploads fail naturally
    /// into the retry policy.
    pub fn set_offline(&mut self) {
        if self.link.go_offline() {
            warn!("network lost, dispatch paused");
            self.events.push_back(UploadEvent::Disconnected);
        }
    }

    /// Network restored: resume dispatching pending and re-enqueued
    /// chunks.
    pub fn set_online(&mut self) {
        if let Some(elapsed) = self.link.go_online(Instant::now()) {
            let offline_secs = elapsed.map(|d| (d.as_secs_f64() * 10.0).round() / 10.0);
            info!(?offline_secs, "network restored, dispatch resumed");
            self.events
                .push_back(UploadEvent::Reconnected { offline_secs });
            self.fill_dispatch();
        }
    }

    pub fn is_offline(&self) -> bool {
        self.link.is_offline()
    }

    /// Currently in-flight chunk uploads across all files.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight_total
    }

    /// Current state of a tracked transfer.
    pub fn transfer_state(&self, file_id: &str) -> Option<TransferState> {
        self.slots.get(file_id).map(|s| s.transfer.state())
    }

    pub fn transfer(&self, file_id: &str) -> Option<&FileTransfer> {
        self.slots.get(file_id).map(|s| &s.transfer)
    }

    /// True when nothing is running and nothing can make progress
    /// without external input (new files, retry timers, reconnect).
    pub fn is_quiescent(&self) -> bool {
        self.in_flight_total == 0
            && self.slots.values().all(|s| s.delayed.is_empty())
            && (self.is_offline() || self.slots.values().all(|s| s.pending.is_empty()))
    }

    fn fail_file(&mut self, file_id: &str, reason: FailReason) {
        let Some(slot) = self.slots.get_mut(file_id) else {
            return;
        };
        slot.transfer.fail(reason);
        // Pending and delayed work is dropped; in-flight siblings are
        // allowed to finish but their results will be discarded.
        slot.pending.clear();
        slot.delayed.clear();
        warn!(file = slot.transfer.name(), ?reason, "transfer failed");
        self.events.push_back(UploadEvent::Failed {
            file_id: file_id.to_string(),
            reason,
        });
        self.check_batch();
    }

    /// Dispatches pending chunks up to the global ceiling and per-file
    /// cap, ascending chunk index within a file, FIFO across files.
    fn fill_dispatch(&mut self) {
        while self.in_flight_total < self.config.parallel_uploads && !self.link.is_offline() {
            let mut picked = None;
            for id in &self.order {
                let Some(slot) = self.slots.get(id) else {
                    continue;
                };
                if slot.transfer.state().is_terminal() {
                    continue;
                }
                if slot.in_flight.len() >= self.config.parallel_chunk_uploads {
                    continue;
                }
                if let Some(&index) = slot.pending.first() {
                    picked = Some((id.clone(), index));
                    break;
                }
            }
            let Some((id, index)) = picked else {
                break;
            };
            let Some(slot) = self.slots.get_mut(&id) else {
                break;
            };
            let Some(range) = slot.transfer.plan().range(index) else {
                slot.pending.remove(&index);
                continue;
            };
            slot.pending.remove(&index);
            slot.in_flight.insert(index);
            self.in_flight_total += 1;
            slot.transfer.mark_transferring();
            let attempt = slot.transfer.retries(index);
            debug!(file = slot.transfer.name(), chunk = index, attempt, "dispatching chunk");
            self.actions.push_back(SchedulerAction::Dispatch(ChunkTask {
                file_id: id,
                chunk_index: index,
                range,
                attempt,
            }));
        }
    }

    /// Reports batch completion once every tracked file is terminal.
    /// Re-arms whenever a new file is added.
    fn check_batch(&mut self) {
        if self.batch_reported || self.slots.is_empty() {
            return;
        }
        if self
            .slots
            .values()
            .all(|s| s.transfer.state().is_terminal())
        {
            let incomplete = self
                .slots
                .values()
                .filter(|s| {
                    !matches!(
                        s.transfer.state(),
                        TransferState::Complete | TransferState::Skipped
                    )
                })
                .count();
            self.events
                .push_back(UploadEvent::BatchComplete { incomplete });
            self.batch_reported = true;
        }
    }
}
