//! Async driver: wires the deterministic [`SchedulerCore`] to a real
//! [`UploadEndpoint`] on a tokio runtime.
//!
//! Single event loop, cooperative: commands from the handle and task
//! results from spawned uploads arrive on channels and mutate the core
//! one at a time, so the shared state needs no locking.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use uplink_protocol::ChunkUploadFields;
use uplink_transfer::{ChunkPlan, ChunkSource, FailReason, FileTransfer, TransferError, UploadError};

use crate::config::UploaderConfig;
use crate::endpoint::UploadEndpoint;
use crate::error::CoordinatorError;
use crate::events::UploadEvent;
use crate::resume::{self, ResumeDecision};
use crate::scheduler::{SchedulerAction, SchedulerCore, TaskContext};

enum Command {
    Submit {
        id: String,
        name: String,
        path: PathBuf,
        destination: String,
    },
    Cancel {
        id: String,
    },
    SetOffline,
    SetOnline,
}

enum Feedback {
    Resolved {
        transfer: FileTransfer,
        path: PathBuf,
        destination: String,
        decision: ResumeDecision,
    },
    Unreadable {
        transfer: FileTransfer,
        path: PathBuf,
        destination: String,
        error: std::io::Error,
    },
    Finished {
        file_id: String,
        chunk_index: u32,
        result: Result<(), UploadError>,
    },
    ReadFailed {
        file_id: String,
        chunk_index: u32,
        error: TransferError,
    },
    RetryDue {
        file_id: String,
        chunk_index: u32,
    },
}

/// Handle for submitting and controlling transfers while the
/// [`Coordinator`] runs. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Submits a file for upload to `destination`. Returns the transfer
    /// id used in all subsequent events.
    pub async fn submit(
        &self,
        path: impl Into<PathBuf>,
        destination: &str,
    ) -> Result<String, CoordinatorError> {
        let path = path.into();
        let id = Uuid::new_v4().to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.cmd_tx
            .send(Command::Submit {
                id: id.clone(),
                name,
                path,
                destination: destination.to_string(),
            })
            .await
            .map_err(|_| CoordinatorError::Shutdown)?;
        Ok(id)
    }

    /// Cancels a transfer: pending and in-flight chunks are abandoned
    /// and no further events are emitted for it.
    pub async fn cancel(&self, file_id: &str) -> Result<(), CoordinatorError> {
        self.cmd_tx
            .send(Command::Cancel {
                id: file_id.to_string(),
            })
            .await
            .map_err(|_| CoordinatorError::Shutdown)
    }

    /// Signals network loss: dispatch pauses until `set_online`.
    pub async fn set_offline(&self) -> Result<(), CoordinatorError> {
        self.cmd_tx
            .send(Command::SetOffline)
            .await
            .map_err(|_| CoordinatorError::Shutdown)
    }

    /// Signals network restoration: dispatch resumes.
    pub async fn set_online(&self) -> Result<(), CoordinatorError> {
        self.cmd_tx
            .send(Command::SetOnline)
            .await
            .map_err(|_| CoordinatorError::Shutdown)
    }
}

/// Owns the scheduler core and the event loop.
pub struct Coordinator {
    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: mpsc::Receiver<Command>,
    feedback_rx: mpsc::Receiver<Feedback>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    inner: DriverLoop,
}

/// Everything the event loop mutates. Split from [`Coordinator`] so
/// `run` can drop the coordinator's own command sender — otherwise the
/// command channel would never close.
struct DriverLoop {
    endpoint: Arc<dyn UploadEndpoint>,
    core: SchedulerCore,
    feedback_tx: mpsc::Sender<Feedback>,
    events_tx: mpsc::Sender<UploadEvent>,
    /// Files submitted but still resolving; they are invisible to the
    /// scheduler, so quiescence must wait for them separately.
    preparing: HashSet<String>,
    /// Files cancelled while still resolving; dropped when the resolve
    /// result lands instead of being scheduled.
    cancelled: HashSet<String>,
}

impl Coordinator {
    pub fn new(endpoint: Arc<dyn UploadEndpoint>, config: UploaderConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (feedback_tx, feedback_rx) = mpsc::channel(256);
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            cmd_tx,
            cmd_rx,
            feedback_rx,
            events_rx: Some(events_rx),
            inner: DriverLoop {
                endpoint,
                core: SchedulerCore::new(config),
                feedback_tx,
                events_tx,
                preparing: HashSet::new(),
                cancelled: HashSet::new(),
            },
        }
    }

    /// Returns a control handle. Dropping all handles lets `run` finish
    /// once the queue drains.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Takes the status event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Runs the event loop until every handle is dropped and no work
    /// can make further progress.
    pub async fn run(self) {
        let Coordinator {
            cmd_tx,
            mut cmd_rx,
            mut feedback_rx,
            events_rx: _,
            mut inner,
        } = self;
        // The coordinator's own sender must not keep the command
        // channel alive.
        drop(cmd_tx);

        let mut commands_open = true;
        loop {
            inner.pump().await;
            if !commands_open && inner.preparing.is_empty() && inner.core.is_quiescent() {
                break;
            }
            tokio::select! {
                cmd = cmd_rx.recv(), if commands_open => match cmd {
                    Some(cmd) => inner.handle_command(cmd).await,
                    None => commands_open = false,
                },
                Some(feedback) = feedback_rx.recv() => inner.handle_feedback(feedback).await,
            }
        }
        inner.pump().await;
    }
}

impl DriverLoop {
    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit {
                id,
                name,
                path,
                destination,
            } => {
                let _ = self
                    .events_tx
                    .send(UploadEvent::Initializing {
                        file_id: id.clone(),
                    })
                    .await;
                self.spawn_prepare(id, name, path, destination);
            }
            Command::Cancel { id } => {
                // A cancel may land while the file is still resolving;
                // remember it so the resolved transfer is dropped
                // instead of scheduled.
                if !self.core.cancel_file(&id) && self.preparing.contains(&id) {
                    self.cancelled.insert(id);
                }
            }
            Command::SetOffline => self.core.set_offline(),
            Command::SetOnline => self.core.set_online(),
        }
    }

    async fn handle_feedback(&mut self, feedback: Feedback) {
        match feedback {
            Feedback::Resolved {
                transfer,
                path,
                destination,
                decision,
            } => {
                self.preparing.remove(transfer.id());
                if self.cancelled.remove(transfer.id()) {
                    debug!(file = transfer.name(), "cancelled during resume resolution");
                    return;
                }
                self.core.add_file(transfer, path, destination, decision);
            }
            Feedback::Unreadable {
                transfer,
                path,
                destination,
                error,
            } => {
                self.preparing.remove(transfer.id());
                if self.cancelled.remove(transfer.id()) {
                    return;
                }
                error!(file = transfer.name(), error = %error, "cannot read source file");
                self.core
                    .add_failed_file(transfer, path, destination, FailReason::SourceUnreadable);
            }
            Feedback::Finished {
                file_id,
                chunk_index,
                result,
            } => match result {
                Ok(()) => self.core.task_acked(&file_id, chunk_index),
                Err(error) => self.core.task_failed(&file_id, chunk_index, &error),
            },
            Feedback::ReadFailed {
                file_id,
                chunk_index,
                error,
            } => {
                error!(file_id = %file_id, chunk = chunk_index, error = %error, "chunk read failed");
                self.core.task_source_failed(&file_id, chunk_index);
            }
            Feedback::RetryDue {
                file_id,
                chunk_index,
            } => self.core.retry_due(&file_id, chunk_index),
        }
    }

    /// Drains core actions and events: spawns uploads, arms retry
    /// timers, forwards status events to the reporter.
    async fn pump(&mut self) {
        for action in self.core.take_actions() {
            match action {
                SchedulerAction::Dispatch(task) => {
                    let Some(ctx) = self.core.task_context(&task.file_id) else {
                        continue;
                    };
                    self.spawn_upload(task.file_id, task.chunk_index, ctx);
                }
                SchedulerAction::ArmRetry {
                    file_id,
                    chunk_index,
                    delay,
                } => {
                    let feedback_tx = self.feedback_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = feedback_tx
                            .send(Feedback::RetryDue {
                                file_id,
                                chunk_index,
                            })
                            .await;
                    });
                }
            }
        }
        for event in self.core.take_events() {
            // A dropped reporter must not stall uploads.
            if self.events_tx.send(event).await.is_err() {
                break;
            }
        }
    }

    fn spawn_prepare(&mut self, id: String, name: String, path: PathBuf, destination: String) {
        self.preparing.insert(id.clone());
        let endpoint = Arc::clone(&self.endpoint);
        let feedback_tx = self.feedback_tx.clone();
        let chunk_size = self.core.config().chunk_size;
        tokio::spawn(async move {
            let feedback = match tokio::fs::metadata(&path).await {
                Err(error) => Feedback::Unreadable {
                    transfer: FileTransfer::new(id, name, 0, chunk_size),
                    path,
                    destination,
                    error,
                },
                Ok(meta) => {
                    let transfer = FileTransfer::new(id, name, meta.len(), chunk_size);
                    let decision = resume::resolve(
                        endpoint.as_ref(),
                        transfer.name(),
                        &destination,
                        transfer.id(),
                        transfer.plan(),
                    )
                    .await;
                    Feedback::Resolved {
                        transfer,
                        path,
                        destination,
                        decision,
                    }
                }
            };
            let _ = feedback_tx.send(feedback).await;
        });
    }

    fn spawn_upload(&self, file_id: String, chunk_index: u32, ctx: TaskContext) {
        let endpoint = Arc::clone(&self.endpoint);
        let feedback_tx = self.feedback_tx.clone();
        debug!(file_id = %file_id, chunk = chunk_index, "upload task spawned");
        tokio::spawn(async move {
            let cancel = ctx.cancel.clone();
            tokio::select! {
                // Cancellation aborts the upload; the scheduler already
                // released this task's slot, so no result is reported.
                _ = cancel.cancelled() => {}
                feedback = upload_one(endpoint, file_id, chunk_index, ctx) => {
                    let _ = feedback_tx.send(feedback).await;
                }
            }
        });
    }
}

/// Reads one chunk from disk and sends it to the endpoint.
async fn upload_one(
    endpoint: Arc<dyn UploadEndpoint>,
    file_id: String,
    chunk_index: u32,
    ctx: TaskContext,
) -> Feedback {
    let plan: ChunkPlan = ctx.plan;
    let path = ctx.path.clone();
    let read = tokio::task::spawn_blocking(move || {
        let mut source = ChunkSource::open(&path, plan)?;
        source.read_chunk(chunk_index)
    })
    .await;

    let chunk = match read {
        Ok(Ok(chunk)) => chunk,
        Ok(Err(error)) => {
            return Feedback::ReadFailed {
                file_id,
                chunk_index,
                error,
            };
        }
        Err(join_error) => {
            return Feedback::ReadFailed {
                file_id,
                chunk_index,
                error: TransferError::Io(std::io::Error::other(join_error)),
            };
        }
    };

    let fields = ChunkUploadFields {
        transfer_id: file_id.clone(),
        chunk_index,
        total_chunks: plan.total_chunks(),
        destination: ctx.destination,
        checksum: chunk.checksum,
    };
    let result = endpoint.upload_chunk(&fields, &chunk.data).await;
    Feedback::Finished {
        file_id,
        chunk_index,
        result,
    }
}
