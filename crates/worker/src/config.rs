//! Worker configuration.

use std::time::Duration;
use anyhow::Result;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Unique worker identifier (UUID).
    pub worker_id: String,

    /// Broker server URL.
    pub server_url: String,

    /// How long a lease is visible to this worker before the broker's
    /// sweeper reclaims it; the heartbeat ticker renews it at
    /// `visibility_seconds / 3`.
    pub visibility_seconds: i64,

    /// How long to sleep between `POST /queue/lease` polls when the
    /// previous poll returned no items.
    pub poll_interval: Duration,

    /// Maximum concurrent tasks (also the `count` requested per lease
    /// call, bounded by available permits).
    pub max_concurrent_tasks: usize,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let worker_id = std::env::var("WORKER_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let server_url = std::env::var("NOETL_SERVER_URL")
            .unwrap_or_else(|_| "http://localhost:8082".to_string());

        let visibility_seconds: i64 = std::env::var("WORKER_VISIBILITY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let poll_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let max_concurrent: usize = std::env::var("WORKER_MAX_CONCURRENT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        Ok(Self {
            worker_id,
            server_url,
            visibility_seconds,
            poll_interval: Duration::from_millis(poll_ms),
            max_concurrent_tasks: max_concurrent,
        })
    }

    /// How often the per-item heartbeat ticker renews its lease.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs((self.visibility_seconds / 3).max(1) as u64)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            server_url: "http://localhost:8082".to_string(),
            visibility_seconds: 60,
            poll_interval: Duration::from_millis(1000),
            max_concurrent_tasks: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.visibility_seconds, 60);
    }

    #[test]
    fn test_heartbeat_interval_is_third_of_visibility() {
        let mut config = WorkerConfig::default();
        config.visibility_seconds = 60;
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(20));
    }
}
