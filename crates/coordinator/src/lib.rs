//! Resumable chunked-upload coordinator.
//!
//! This crate implements the **client-side logic** for moving large
//! files to a chunk-storage server reliably: it discovers prior
//! server-side progress, uploads the remaining chunks with bounded
//! concurrency, retries transient failures with a fixed backoff, and
//! survives a full disconnect/reconnect cycle. It is a library crate
//! with no transport dependency — the caller provides an
//! [`UploadEndpoint`] implementation that bridges to the actual HTTP
//! client.
//!
//! # Flow
//!
//! 1. **Resolve** — checkpoint + chunk-status queries pick a resume point
//! 2. **Schedule** — remaining chunks dispatch under the concurrency ceiling
//! 3. **Retry** — transient failures re-enqueue with a fixed delay
//! 4. **Report** — every state transition is emitted as an [`UploadEvent`]

pub mod config;
pub mod connectivity;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod resume;
pub mod scheduler;

// Re-export primary types for convenience.
pub use config::UploaderConfig;
pub use connectivity::ConnectivityMonitor;
pub use driver::{Coordinator, CoordinatorHandle};
pub use endpoint::UploadEndpoint;
pub use error::CoordinatorError;
pub use events::UploadEvent;
pub use resume::{ResumeDecision, resolve};
pub use scheduler::{SchedulerAction, SchedulerCore};
