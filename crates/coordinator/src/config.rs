use std::time::Duration;

use serde::{Deserialize, Serialize};
use uplink_transfer::{DEFAULT_CHUNK_SIZE, RetryPolicy};

/// Coordinator configuration.
///
/// Defaults mirror the original web client: 16 MiB chunks, 4 uploads in
/// flight globally, chunks of one file allowed to run in parallel,
/// 2 retries per chunk with a 3 second fixed delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    /// Bytes per chunk.
    pub chunk_size: u64,
    /// Global ceiling on concurrently in-flight chunk uploads.
    pub parallel_uploads: usize,
    /// Per-file ceiling on concurrently in-flight chunks.
    pub parallel_chunk_uploads: usize,
    /// Retries per chunk before the file fails.
    pub max_attempts: u32,
    /// Fixed delay before a failed chunk is re-enqueued.
    pub retry_delay_ms: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_uploads: 4,
            parallel_chunk_uploads: 4,
            max_attempts: 2,
            retry_delay_ms: 3000,
        }
    }
}

impl UploaderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.retry_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_client() {
        let c = UploaderConfig::default();
        assert_eq!(c.chunk_size, 16 * 1024 * 1024);
        assert_eq!(c.parallel_uploads, 4);
        assert_eq!(c.max_attempts, 2);
        assert_eq!(c.retry_delay(), Duration::from_secs(3));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: UploaderConfig = serde_json::from_str(r#"{"parallelUploads": 2}"#).unwrap();
        assert_eq!(c.parallel_uploads, 2);
        assert_eq!(c.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(c.max_attempts, 2);
    }

    #[test]
    fn retry_policy_from_config() {
        let c = UploaderConfig {
            max_attempts: 5,
            retry_delay_ms: 100,
            ..Default::default()
        };
        let p = c.retry_policy();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.delay, Duration::from_millis(100));
    }
}
