//! Coordinator error types.

/// Errors surfaced by the coordinator API.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The coordinator task has exited; commands can no longer be
    /// delivered.
    #[error("coordinator is shut down")]
    Shutdown,
}
