//! Worker runtime: lease, execute, report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::client::{ControlPlaneClient, LeasedItem};
use crate::config::WorkerConfig;
use crate::executor::CommandExecutor;

/// Leases queue items from the broker and dispatches them to the tool
/// registry, bounded by `max_concurrent_tasks` in-flight items.
pub struct Worker {
    config: WorkerConfig,
    client: ControlPlaneClient,
    executor: Arc<CommandExecutor>,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    /// Create a new worker.
    pub async fn new(config: WorkerConfig) -> Result<Self> {
        let client = ControlPlaneClient::new(&config.server_url);
        let executor = Arc::new(CommandExecutor::new(config.worker_id.clone()));
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks));

        Ok(Self {
            config,
            client,
            executor,
            semaphore,
        })
    }

    /// Run the lease/execute/report loop until cancelled.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            worker_id = %self.config.worker_id,
            server_url = %self.config.server_url,
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            "worker starting lease loop"
        );

        loop {
            let available = self.semaphore.available_permits().max(1) as i64;

            let items = match self
                .client
                .lease(&self.config.worker_id, available, self.config.visibility_seconds)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(error = %e, "lease request failed");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            if items.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            for item in items {
                let permit = self.semaphore.clone().acquire_owned().await?;
                let client = self.client.clone();
                let executor = self.executor.clone();
                let worker_id = self.config.worker_id.clone();
                let visibility_seconds = self.config.visibility_seconds;
                let heartbeat_interval = self.config.heartbeat_interval();

                tokio::spawn(async move {
                    let _permit = permit;
                    process_item(client, executor, worker_id, visibility_seconds, heartbeat_interval, item)
                        .await;
                });
            }
        }
    }
}

/// Run one leased item to completion: keep its lease alive with a
/// heartbeat ticker while the tool runs, then report the outcome.
async fn process_item(
    client: ControlPlaneClient,
    executor: Arc<CommandExecutor>,
    worker_id: String,
    visibility_seconds: i64,
    heartbeat_interval: Duration,
    item: LeasedItem,
) {
    let queue_id = item.queue_id.clone();

    let heartbeat_handle = {
        let client = client.clone();
        let queue_id = queue_id.clone();
        let worker_id = worker_id.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            ticker.tick().await; // skip the immediate tick
            loop {
                ticker.tick().await;
                match client.heartbeat(&queue_id, &worker_id, visibility_seconds).await {
                    Ok(true) => tracing::trace!(queue_id = %queue_id, "lease renewed"),
                    Ok(false) => {
                        tracing::warn!(queue_id = %queue_id, "lease lost to another worker");
                        break;
                    }
                    Err(e) => tracing::warn!(queue_id = %queue_id, error = %e, "heartbeat failed"),
                }
            }
        })
    };

    let start = Instant::now();
    let outcome = executor.execute(&item).await;
    heartbeat_handle.abort();
    let duration_ms = start.elapsed().as_millis() as i64;

    match outcome {
        Ok(result) if result.is_success() => {
            let result_json = serde_json::to_value(&result).unwrap_or_else(|_| serde_json::json!({}));
            if let Err(e) = client
                .complete(&queue_id, &worker_id, result_json, Some(duration_ms))
                .await
            {
                tracing::error!(queue_id = %queue_id, error = %e, "failed to report completion");
            }
        }
        Ok(result) => {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| format!("tool reported {:?}", result.status));
            if let Err(e) = client.fail(&queue_id, &worker_id, &message, true).await {
                tracing::error!(queue_id = %queue_id, error = %e, "failed to report tool failure");
            }
        }
        Err(e) => {
            tracing::error!(queue_id = %queue_id, error = %e, "tool execution error");
            if let Err(report_err) = client.fail(&queue_id, &worker_id, &e.to_string(), true).await {
                tracing::error!(queue_id = %queue_id, error = %report_err, "failed to report execution error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_defaults() {
        let config = WorkerConfig::default();
        assert!(!config.worker_id.is_empty());
        assert_eq!(config.max_concurrent_tasks, 4);
    }
}
