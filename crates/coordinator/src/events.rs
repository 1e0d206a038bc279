use uplink_transfer::FailReason;

/// Status event emitted to the registered progress reporter.
///
/// One-way notification: the reporter renders these and is never
/// queried back. Per-file events carry the transfer id assigned at
/// submit time; `Disconnected`/`Reconnected`/`BatchComplete` concern
/// the whole queue.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Resume queries in progress for a newly submitted file.
    Initializing { file_id: String },
    /// The server already has the complete file; nothing was uploaded.
    Skipped { file_id: String, size: u64 },
    /// Fresh upload about to start.
    ReadyToStart { file_id: String, size: u64 },
    /// Partial server-side progress found; resuming.
    ReadyToResume {
        file_id: String,
        uploaded: u64,
        total: u64,
    },
    /// Chunk acknowledged; cumulative progress.
    Progress {
        file_id: String,
        percent: f64,
        total: u64,
    },
    /// Transient failure; a retry is pending.
    Interrupted { file_id: String },
    /// Every chunk acknowledged.
    Complete { file_id: String, size: u64 },
    /// Terminal failure for this file only.
    Failed { file_id: String, reason: FailReason },
    /// Network lost; dispatch paused. Persistent until `Reconnected`.
    Disconnected,
    /// Network restored; dispatch resumed. `offline_secs` is measured
    /// from the first failure seen while offline (display only), `None`
    /// when no failure was observed.
    Reconnected { offline_secs: Option<f64> },
    /// Every submitted file reached a terminal state. `incomplete`
    /// counts files that ended neither `Complete` nor `Skipped`.
    BatchComplete { incomplete: usize },
}

impl UploadEvent {
    /// Transfer id for per-file events, `None` for queue-wide ones.
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::Initializing { file_id }
            | Self::Skipped { file_id, .. }
            | Self::ReadyToStart { file_id, .. }
            | Self::ReadyToResume { file_id, .. }
            | Self::Progress { file_id, .. }
            | Self::Interrupted { file_id }
            | Self::Complete { file_id, .. }
            | Self::Failed { file_id, .. } => Some(file_id),
            Self::Disconnected | Self::Reconnected { .. } | Self::BatchComplete { .. } => None,
        }
    }
}
