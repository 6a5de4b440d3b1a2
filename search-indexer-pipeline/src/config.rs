//! Pipeline configuration.
//!
//! All limits of a session live here: batch bounds, concurrency, retry
//! timing, the fatal-failure threshold and the various timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use search_indexer_repository::StatusPolicy;

/// Configuration for an indexing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of documents per bulk batch.
    pub max_batch_count: usize,
    /// Maximum cumulative document size per batch (in bytes).
    pub max_batch_bytes: usize,
    /// Maximum number of batches awaiting a response at once.
    pub max_concurrent_batches: usize,
    /// Delay before the first retry (in milliseconds).
    pub retry_base_delay_ms: u64,
    /// Upper bound for any retry delay (in milliseconds).
    pub retry_max_delay_ms: u64,
    /// Relative jitter applied to retry delays, in `[0, 1)`.
    pub retry_jitter: f64,
    /// Number of retries allowed after the first submission.
    pub max_attempts: u32,
    /// Abort when the fatal-failure rate exceeds this value. `None` disables it.
    pub fatal_failure_rate_threshold: Option<f64>,
    /// Minimum resolved documents before the threshold is evaluated.
    pub fatal_failure_min_samples: usize,
    /// Flush a partial batch after this much input silence (in milliseconds).
    pub idle_flush_timeout_ms: u64,
    /// Timeout for a single bulk request (in milliseconds).
    pub submission_timeout_ms: u64,
    /// Optional wall-clock budget for the whole session (in milliseconds).
    pub session_timeout_ms: Option<u64>,
    /// Capacity of the channel between the source and the scheduler.
    pub channel_buffer_size: usize,
    /// Ask the engine to refresh after each bulk request.
    pub refresh: bool,
    /// Status and error-type classification table.
    pub status_policy: StatusPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_count: 500,
            max_batch_bytes: 10 * 1024 * 1024,
            max_concurrent_batches: 4,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5_000,
            retry_jitter: 0.1,
            max_attempts: 3,
            fatal_failure_rate_threshold: Some(0.5),
            fatal_failure_min_samples: 100,
            idle_flush_timeout_ms: 5_000,
            submission_timeout_ms: 30_000,
            session_timeout_ms: None,
            channel_buffer_size: 256,
            refresh: false,
            status_policy: StatusPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_batch_count == 0 {
            return Err(PipelineError::config("max_batch_count must be at least 1"));
        }
        if self.max_batch_bytes == 0 {
            return Err(PipelineError::config("max_batch_bytes must be at least 1"));
        }
        if self.max_concurrent_batches == 0 {
            return Err(PipelineError::config(
                "max_concurrent_batches must be at least 1",
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(PipelineError::config("channel_buffer_size must be at least 1"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(PipelineError::config(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(PipelineError::config(format!(
                "retry_jitter must be in [0, 1), got {}",
                self.retry_jitter
            )));
        }
        if let Some(threshold) = self.fatal_failure_rate_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PipelineError::config(format!(
                    "fatal_failure_rate_threshold must be in [0, 1], got {}",
                    threshold
                )));
            }
        }
        if self.submission_timeout_ms == 0 {
            return Err(PipelineError::config("submission_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn idle_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_flush_timeout_ms)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_count, 500);
        assert_eq!(config.max_concurrent_batches, 4);
        assert_eq!(config.session_timeout(), None);
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let config = PipelineConfig {
            max_batch_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::ConfigError(_))
        ));

        let config = PipelineConfig {
            max_concurrent_batches: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_retry_delays_rejected() {
        let config = PipelineConfig {
            retry_base_delay_ms: 10_000,
            retry_max_delay_ms: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_batch_count": 50, "refresh": true}"#).unwrap();
        assert_eq!(config.max_batch_count, 50);
        assert!(config.refresh);
        assert_eq!(config.max_batch_bytes, 10 * 1024 * 1024);
        assert_eq!(config.fatal_failure_rate_threshold, Some(0.5));
    }
}
