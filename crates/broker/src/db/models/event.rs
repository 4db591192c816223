//! Event model for execution event sourcing.
//!
//! All workflow state is derived from events stored in the event table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Event types for workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Execution started.
    ExecutionStarted,
    /// Execution completed successfully.
    ExecutionComplete,
    /// Execution failed.
    ExecutionFailed,
    /// Step entered (guard passed, about to dispatch).
    StepStarted,
    /// A queue item for this step began running on a worker.
    ActionStarted,
    /// A queue item completed successfully.
    ActionCompleted,
    /// A queue item failed (terminal or about to retry).
    ActionError,
    /// Step reached a terminal state (all of its tasks/iterations done).
    StepCompleted,
    /// One iterator item was dispatched.
    LoopIteration,
    /// An iterator frame finished (all items done or fail-fast triggered).
    LoopCompleted,
    /// Execution or step was explicitly cancelled.
    Cancel,
    /// Custom event type (for extensibility).
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::ExecutionStarted => "execution_started",
            EventType::ExecutionComplete => "execution_complete",
            EventType::ExecutionFailed => "execution_failed",
            EventType::StepStarted => "step_started",
            EventType::ActionStarted => "action_started",
            EventType::ActionCompleted => "action_completed",
            EventType::ActionError => "action_error",
            EventType::StepCompleted => "step_completed",
            EventType::LoopIteration => "loop_iteration",
            EventType::LoopCompleted => "loop_completed",
            EventType::Cancel => "cancel",
            EventType::Custom(s) => s,
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "execution_started" => EventType::ExecutionStarted,
            "execution_complete" => EventType::ExecutionComplete,
            "execution_failed" => EventType::ExecutionFailed,
            "step_started" => EventType::StepStarted,
            "action_started" => EventType::ActionStarted,
            "action_completed" => EventType::ActionCompleted,
            "action_error" => EventType::ActionError,
            "step_completed" => EventType::StepCompleted,
            "loop_iteration" => EventType::LoopIteration,
            "loop_completed" => EventType::LoopCompleted,
            "cancel" => EventType::Cancel,
            other => EventType::Custom(other.to_string()),
        }
    }
}

/// Event status values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Running,
    Ok,
    Error,
    Cancelled,
    Timeout,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Running => "running",
            EventStatus::Ok => "ok",
            EventStatus::Error => "error",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => EventStatus::Pending,
            "running" => EventStatus::Running,
            "ok" => EventStatus::Ok,
            "error" => EventStatus::Error,
            "cancelled" | "canceled" => EventStatus::Cancelled,
            "timeout" => EventStatus::Timeout,
            _ => EventStatus::Pending,
        }
    }
}

/// Database event record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    /// Primary key (same as event_id for events).
    pub id: i64,

    /// Execution identifier.
    pub execution_id: i64,

    /// Catalog entry ID.
    pub catalog_id: i64,

    /// Event identifier (snowflake ID).
    pub event_id: i64,

    /// Parent event ID for ordering/hierarchy.
    pub parent_event_id: Option<i64>,

    /// Parent execution ID (for nested playbooks).
    pub parent_execution_id: Option<i64>,

    /// Event type.
    pub event_type: String,

    /// Node identifier.
    pub node_id: Option<String>,

    /// Node name (step name).
    pub node_name: Option<String>,

    /// Node type (step, workflow, execution, etc.).
    pub node_type: Option<String>,

    /// Event status.
    pub status: String,

    /// Event context (JSON).
    pub context: Option<serde_json::Value>,

    /// Event metadata (JSON).
    pub meta: Option<serde_json::Value>,

    /// Result data (JSON) - for command results.
    pub result: Option<serde_json::Value>,

    /// Worker ID (for command events).
    pub worker_id: Option<String>,

    /// Attempt number (for retries).
    pub attempt: Option<i32>,

    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

/// Request to create a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCreateRequest {
    /// Execution identifier.
    pub execution_id: i64,

    /// Catalog entry ID.
    pub catalog_id: i64,

    /// Parent event ID.
    pub parent_event_id: Option<i64>,

    /// Parent execution ID.
    pub parent_execution_id: Option<i64>,

    /// Event type.
    pub event_type: String,

    /// Node identifier.
    pub node_id: Option<String>,

    /// Node name (step name).
    pub node_name: Option<String>,

    /// Node type.
    pub node_type: Option<String>,

    /// Event status.
    pub status: String,

    /// Event context (JSON).
    pub context: Option<serde_json::Value>,

    /// Event metadata (JSON).
    pub meta: Option<serde_json::Value>,

    /// Result data (JSON).
    pub result: Option<serde_json::Value>,

    /// Worker ID.
    pub worker_id: Option<String>,

    /// Attempt number.
    pub attempt: Option<i32>,
}

/// Event response for API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    /// Event ID.
    pub event_id: String,

    /// Execution ID.
    pub execution_id: String,

    /// Event type.
    pub event_type: String,

    /// Node name.
    pub node_name: Option<String>,

    /// Status.
    pub status: String,

    /// Context.
    pub context: Option<serde_json::Value>,

    /// Result.
    pub result: Option<serde_json::Value>,

    /// Created at.
    pub created_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(e: Event) -> Self {
        Self {
            event_id: e.event_id.to_string(),
            execution_id: e.execution_id.to_string(),
            event_type: e.event_type,
            node_name: e.node_name,
            status: e.status,
            context: e.context,
            result: e.result,
            created_at: e.created_at,
        }
    }
}

/// List of events response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListResponse {
    /// List of events.
    pub events: Vec<EventResponse>,

    /// Total count.
    pub total: i64,
}

/// Worker event payload (from worker completing a command).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEventPayload {
    /// Queue item ID (event_id of the action_started event).
    pub command_id: String,

    /// Worker ID.
    pub worker_id: String,

    /// Event type (action_completed, action_error, etc.).
    pub event_type: String,

    /// Result data.
    pub result: Option<serde_json::Value>,

    /// Error message (for failed events).
    pub error: Option<String>,

    /// Execution duration in milliseconds.
    pub duration_ms: Option<i64>,

    /// Attempt number.
    pub attempt: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(
            EventType::ExecutionStarted.to_string(),
            "execution_started"
        );
        assert_eq!(EventType::LoopIteration.to_string(), "loop_iteration");
        assert_eq!(EventType::ActionCompleted.to_string(), "action_completed");
    }

    #[test]
    fn test_event_type_from_str() {
        assert_eq!(
            EventType::from("execution_started"),
            EventType::ExecutionStarted
        );
        assert_eq!(
            EventType::from("loop_completed"),
            EventType::LoopCompleted
        );
        assert_eq!(
            EventType::from("action_completed"),
            EventType::ActionCompleted
        );
        assert_eq!(
            EventType::from("custom_event"),
            EventType::Custom("custom_event".to_string())
        );
    }

    #[test]
    fn test_event_status_display() {
        assert_eq!(EventStatus::Pending.to_string(), "pending");
        assert_eq!(EventStatus::Ok.to_string(), "ok");
        assert_eq!(EventStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_event_status_from_str() {
        assert_eq!(EventStatus::from("pending"), EventStatus::Pending);
        assert_eq!(EventStatus::from("OK"), EventStatus::Ok);
        assert_eq!(EventStatus::from("Error"), EventStatus::Error);
    }
}
