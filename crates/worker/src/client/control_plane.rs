//! Queue Service HTTP client.
//!
//! Mirrors the broker's `db/models/queue.rs` wire shapes field-for-field;
//! the worker cannot depend on the broker crate, so the request/response
//! types are redefined here against the same JSON contract.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A leased queue item handed to this worker by `POST /queue/lease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeasedItem {
    pub queue_id: String,
    pub execution_id: String,
    pub catalog_id: String,
    pub node_id: String,
    pub parent_event_id: String,
    pub action: serde_json::Value,
    pub context: serde_json::Value,
    pub iterator: Option<serde_json::Value>,
    pub attempt: i32,
    pub lease_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
struct LeaseRequest {
    worker_id: String,
    count: i64,
    visibility_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct LeaseResponse {
    items: Vec<LeasedItem>,
}

#[derive(Debug, Clone, Serialize)]
struct HeartbeatRequest {
    queue_id: String,
    worker_id: String,
    visibility_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct HeartbeatResponse {
    status: String,
}

#[derive(Debug, Clone, Serialize)]
struct CompleteRequest {
    queue_id: String,
    worker_id: String,
    result: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
struct FailRequest {
    queue_id: String,
    worker_id: String,
    error: String,
    retryable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueAckResponse {
    pub status: String,
    pub events_emitted: i32,
    pub commands_enqueued: i32,
}

/// HTTP client for the broker's Queue Service.
#[derive(Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    server_url: String,
}

impl ControlPlaneClient {
    /// Create a new client.
    pub fn new(server_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    /// `POST /queue/lease` - request up to `count` ready items.
    pub async fn lease(
        &self,
        worker_id: &str,
        count: i64,
        visibility_seconds: i64,
    ) -> Result<Vec<LeasedItem>> {
        let request = LeaseRequest {
            worker_id: worker_id.to_string(),
            count,
            visibility_seconds,
        };

        let response = self
            .client
            .post(format!("{}/queue/lease", self.server_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("lease request failed: {}", body);
        }

        let body: LeaseResponse = response.json().await?;
        Ok(body.items)
    }

    /// `POST /queue/heartbeat` - extend a lease while work is in flight.
    pub async fn heartbeat(
        &self,
        queue_id: &str,
        worker_id: &str,
        visibility_seconds: i64,
    ) -> Result<bool> {
        let request = HeartbeatRequest {
            queue_id: queue_id.to_string(),
            worker_id: worker_id.to_string(),
            visibility_seconds,
        };

        let response = self
            .client
            .post(format!("{}/queue/heartbeat", self.server_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("heartbeat request failed: {}", body);
        }

        let body: HeartbeatResponse = response.json().await?;
        Ok(body.status == "ok")
    }

    /// `POST /queue/complete` - report success.
    pub async fn complete(
        &self,
        queue_id: &str,
        worker_id: &str,
        result: serde_json::Value,
        duration_ms: Option<i64>,
    ) -> Result<QueueAckResponse> {
        let request = CompleteRequest {
            queue_id: queue_id.to_string(),
            worker_id: worker_id.to_string(),
            result,
            duration_ms,
        };

        let response = self
            .client
            .post(format!("{}/queue/complete", self.server_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("complete request failed: {}", body);
        }

        Ok(response.json().await?)
    }

    /// `POST /queue/fail` - report failure; `retryable` lets the broker
    /// decide between backoff and deadlettering.
    pub async fn fail(
        &self,
        queue_id: &str,
        worker_id: &str,
        error: &str,
        retryable: bool,
    ) -> Result<QueueAckResponse> {
        let request = FailRequest {
            queue_id: queue_id.to_string(),
            worker_id: worker_id.to_string(),
            error: error.to_string(),
            retryable,
        };

        let response = self
            .client
            .post(format!("{}/queue/fail", self.server_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("fail request failed: {}", body);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ControlPlaneClient::new("http://localhost:8082/");
        assert_eq!(client.server_url, "http://localhost:8082");
    }

    #[test]
    fn test_leased_item_deserialization() {
        let json = serde_json::json!({
            "queue_id": "42",
            "execution_id": "100",
            "catalog_id": "7",
            "node_id": "process",
            "parent_event_id": "99",
            "action": {"kind": "shell", "config": {"command": "echo hi"}},
            "context": {},
            "iterator": null,
            "attempt": 1,
            "lease_deadline": "2026-01-01T00:00:00Z",
        });

        let item: LeasedItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.queue_id, "42");
        assert_eq!(item.node_id, "process");
    }
}
