//! Configuration types for fetch-pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Pipeline configuration
///
/// Everything is supplied at construction; a running pipeline is never
/// reconfigured. Missing fields deserialize to their defaults, so an empty
/// JSON object is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Number of fetch workers started per run (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout (default: 5 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Output sink path, truncated at the start of every run (default: "./results.jsonl")
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Capacity of the work and sink queues (None = unbounded)
    ///
    /// With a bound, producers wait for a free slot instead of growing the
    /// buffer. FIFO order per producer is preserved either way.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// User-Agent header sent with every request (None = reqwest default)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            request_timeout: default_request_timeout(),
            output_path: default_output_path(),
            queue_capacity: None,
            user_agent: None,
        }
    }
}

impl Config {
    /// Check the configuration for values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers", "worker pool size must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout",
                "request timeout must be greater than zero",
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(Error::config(
                "queue_capacity",
                "queue capacity must be at least 1 when bounded",
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::config("output_path", "output path must not be empty"));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    5
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./results.jsonl")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.output_path, PathBuf::from("./results.jsonl"));
        assert_eq!(config.queue_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_object_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.workers, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn request_timeout_serializes_as_whole_seconds() {
        let config = Config {
            request_timeout: Duration::from_secs(12),
            ..Default::default()
        };

        let json = serde_json::to_value(&config).expect("serialize failed");
        assert_eq!(json["request_timeout"], 12);

        let back: Config = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn zero_workers_is_rejected_with_key() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("workers")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn zero_timeout_is_rejected_with_key() {
        let config = Config {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("request_timeout"))
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn zero_queue_capacity_is_rejected_but_none_is_fine() {
        let bounded_zero = Config {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            bounded_zero.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "queue_capacity"
        ));

        let bounded = Config {
            queue_capacity: Some(1),
            ..Default::default()
        };
        assert!(bounded.validate().is_ok());
    }
}
