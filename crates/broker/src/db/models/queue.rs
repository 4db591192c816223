//! Queue database model.
//!
//! A queue item is a lease-able unit of work dispatched to workers,
//! keyed by `(execution_id, node_id)` (I4: at most one `leased` item
//! per key at any wall-clock instant).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Queue item lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Ready,
    Leased,
    Done,
    Failed,
    Dead,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Ready => "ready",
            QueueStatus::Leased => "leased",
            QueueStatus::Done => "done",
            QueueStatus::Failed => "failed",
            QueueStatus::Dead => "dead",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for QueueStatus {
    fn from(s: &str) -> Self {
        match s {
            "ready" => QueueStatus::Ready,
            "leased" => QueueStatus::Leased,
            "done" => QueueStatus::Done,
            "failed" => QueueStatus::Failed,
            "dead" => QueueStatus::Dead,
            _ => QueueStatus::Ready,
        }
    }
}

/// Database queue record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueueItem {
    /// Primary key (snowflake ID).
    pub id: i64,

    pub execution_id: i64,

    /// Step/iteration key, unique within an execution.
    pub node_id: String,

    pub catalog_id: i64,

    /// event_id of the `step_started`/`loop_iteration` event that
    /// created this item; becomes the `parent_event_id` of whatever
    /// `action_started`/`action_completed`/`action_error` the worker emits.
    pub parent_event_id: i64,

    /// Rendered tool command (engine::commands::ToolCommand, as JSON).
    pub action: serde_json::Value,

    /// Rendered step context at dispatch time.
    pub context: serde_json::Value,

    /// Loop iteration metadata, if this item is part of a fan-out.
    pub iterator: Option<serde_json::Value>,

    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,

    /// Earliest time a worker may pick this item up even while `ready`
    /// (retry backoff); `NULL` means immediately eligible.
    pub not_before: Option<DateTime<Utc>>,

    pub lease_deadline: Option<DateTime<Utc>>,
    pub status: String,
    pub last_worker_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to enqueue a new item.
#[derive(Debug, Clone)]
pub struct QueueEnqueueRequest {
    pub execution_id: i64,
    pub node_id: String,
    pub catalog_id: i64,
    pub parent_event_id: i64,
    pub action: serde_json::Value,
    pub context: serde_json::Value,
    pub iterator: Option<serde_json::Value>,
    pub priority: i32,
    pub max_attempts: i32,
    pub not_before: Option<DateTime<Utc>>,
}

/// Request body for `POST /queue/lease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub worker_id: String,
    #[serde(default = "default_lease_count")]
    pub count: i64,
    #[serde(default = "default_visibility_seconds")]
    pub visibility_seconds: i64,
}

fn default_lease_count() -> i64 {
    1
}
fn default_visibility_seconds() -> i64 {
    60
}

/// A leased queue item handed to a worker.
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

impl From<QueueItem> for LeasedItem {
    fn from(item: QueueItem) -> Self {
        Self {
            queue_id: item.id.to_string(),
            execution_id: item.execution_id.to_string(),
            catalog_id: item.catalog_id.to_string(),
            node_id: item.node_id,
            parent_event_id: item.parent_event_id.to_string(),
            action: item.action,
            context: item.context,
            iterator: item.iterator,
            attempt: item.attempts,
            lease_deadline: item.lease_deadline.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseResponse {
    pub items: Vec<LeasedItem>,
}

/// Request body for `POST /queue/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub queue_id: String,
    pub worker_id: String,
    #[serde(default = "default_visibility_seconds")]
    pub visibility_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    /// "ok" if the lease was extended, "lost" if the caller no longer
    /// owns it.
    pub status: String,
}

/// Request body for `POST /queue/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub queue_id: String,
    pub worker_id: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

/// Request body for `POST /queue/fail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailRequest {
    pub queue_id: String,
    pub worker_id: String,
    pub error: String,
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

/// Response shared by complete/fail: how many follow-on events/commands
/// the orchestrator pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAckResponse {
    pub status: String,
    pub events_emitted: i32,
    pub commands_enqueued: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_status_round_trip() {
        assert_eq!(QueueStatus::from("leased"), QueueStatus::Leased);
        assert_eq!(QueueStatus::Dead.as_str(), "dead");
    }

    #[test]
    fn test_lease_request_defaults() {
        let req: LeaseRequest = serde_json::from_str(r#"{"worker_id": "w1"}"#).unwrap();
        assert_eq!(req.count, 1);
        assert_eq!(req.visibility_seconds, 60);
    }

    #[test]
    fn test_fail_request_defaults() {
        let req: FailRequest =
            serde_json::from_str(r#"{"queue_id": "1", "worker_id": "w1", "error": "boom"}"#)
                .unwrap();
        assert!(req.retryable);
    }
}
