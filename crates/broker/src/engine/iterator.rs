//! Iterator frame reconstruction for `loop` steps.
//!
//! A loop step fans out into one queue item per collection element. Each
//! dispatched element is recorded as a `loop_iteration` event (the parent
//! of that element's `action_started`/`action_completed`/`action_error`
//! chain); the frame as a whole finishes with a single `loop_completed`
//! event carrying the aggregated result. Like `WorkflowState`, an
//! `IteratorFrame` is a pure replay of the event log for one step - it
//! holds no state of its own between calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::models::Event;
use crate::playbook::types::LoopMode;

/// Terminal/non-terminal status of one dispatched iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Dispatched,
    Completed,
    Failed,
}

/// One element of the collection being iterated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationState {
    pub index: usize,
    pub item: serde_json::Value,
    /// event_id of this iteration's `loop_iteration` event; the parent
    /// of its command's completion/error event.
    pub loop_iteration_event_id: i64,
    pub status: IterationStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Reconstructed state of a loop step's fan-out.
#[derive(Debug, Clone)]
pub struct IteratorFrame {
    pub step_name: String,
    pub total: usize,
    pub mode: LoopMode,
    pub max_in_flight: Option<usize>,
    pub fail_fast: bool,
    pub iterations: Vec<IterationState>,
    pub completed_event_seen: bool,
}

impl IteratorFrame {
    /// Replay the event log for one loop step. Returns `None` if the
    /// step has not dispatched any iterations yet.
    pub fn from_events(step_name: &str, events: &[Event]) -> Option<Self> {
        let mut iterations: HashMap<usize, IterationState> = HashMap::new();
        let mut mode = LoopMode::Sequential;
        let mut max_in_flight = None;
        let mut fail_fast = true;
        let mut total = 0usize;
        let mut completed_event_seen = false;

        // event_id -> index, so completion events (linked via parent_event_id)
        // can be matched back to the iteration that spawned them.
        let mut by_event_id: HashMap<i64, usize> = HashMap::new();

        for event in events {
            if event.event_type == "loop_iteration" && event.node_name.as_deref() == Some(step_name)
            {
                let ctx = event.context.as_ref();
                let index = ctx
                    .and_then(|c| c.get("_index"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize;
                let item = ctx
                    .and_then(|c| c.get("_item"))
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                total = ctx
                    .and_then(|c| c.get("_total"))
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .unwrap_or(total);
                if let Some(m) = ctx.and_then(|c| c.get("_mode")).and_then(|v| v.as_str()) {
                    mode = match m {
                        "parallel" => LoopMode::Parallel,
                        "chunked" => LoopMode::Chunked,
                        _ => LoopMode::Sequential,
                    };
                }
                max_in_flight = ctx
                    .and_then(|c| c.get("_max_in_flight"))
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .or(max_in_flight);
                if let Some(oe) = ctx.and_then(|c| c.get("_on_error")).and_then(|v| v.as_str()) {
                    fail_fast = oe != "collect_errors";
                }

                by_event_id.insert(event.event_id, index);
                iterations.entry(index).or_insert(IterationState {
                    index,
                    item,
                    loop_iteration_event_id: event.event_id,
                    status: IterationStatus::Dispatched,
                    result: None,
                    error: None,
                });
                continue;
            }

            if event.event_type == "loop_completed" && event.node_name.as_deref() == Some(step_name)
            {
                completed_event_seen = true;
                continue;
            }

            let Some(parent) = event.parent_event_id else {
                continue;
            };
            let Some(&index) = by_event_id.get(&parent) else {
                continue;
            };

            match event.event_type.as_str() {
                "action_completed" => {
                    if let Some(it) = iterations.get_mut(&index) {
                        it.status = IterationStatus::Completed;
                        it.result = event.result.clone();
                    }
                }
                "action_error" => {
                    if let Some(it) = iterations.get_mut(&index) {
                        it.status = IterationStatus::Failed;
                        it.error = event
                            .result
                            .as_ref()
                            .and_then(|r| r.get("error"))
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string());
                    }
                }
                _ => {}
            }
        }

        if iterations.is_empty() {
            return None;
        }

        let mut iterations: Vec<IterationState> = iterations.into_values().collect();
        iterations.sort_by_key(|i| i.index);

        Some(Self {
            step_name: step_name.to_string(),
            total,
            mode,
            max_in_flight,
            fail_fast,
            iterations,
            completed_event_seen,
        })
    }

    /// Indices not yet dispatched at all.
    pub fn undispatched_indices(&self, collection_len: usize) -> Vec<usize> {
        let dispatched: std::collections::HashSet<usize> =
            self.iterations.iter().map(|i| i.index).collect();
        (0..collection_len)
            .filter(|i| !dispatched.contains(i))
            .collect()
    }

    /// Number of iterations still dispatched-but-not-terminal.
    pub fn in_flight_count(&self) -> usize {
        self.iterations
            .iter()
            .filter(|i| i.status == IterationStatus::Dispatched)
            .count()
    }

    /// Whether a failure has occurred under `fail_fast` semantics.
    pub fn has_fatal_failure(&self) -> bool {
        self.fail_fast && self.iterations.iter().any(|i| i.status == IterationStatus::Failed)
    }

    /// Whether every expected iteration has reached a terminal state.
    pub fn all_terminal(&self, collection_len: usize) -> bool {
        self.iterations.len() >= collection_len
            && self
                .iterations
                .iter()
                .all(|i| i.status != IterationStatus::Dispatched)
    }

    /// Whether the frame is ready to fold into a `loop_completed` event:
    /// either every iteration is terminal, or a fatal failure has fired
    /// and nothing is left in flight.
    pub fn is_ready_to_complete(&self, collection_len: usize) -> bool {
        if self.completed_event_seen {
            return false;
        }
        if self.has_fatal_failure() {
            return self.in_flight_count() == 0;
        }
        self.all_terminal(collection_len)
    }

    /// Aggregate per-iteration results into the step's overall result,
    /// in collection order.
    pub fn aggregate_result(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .iterations
            .iter()
            .map(|i| match i.status {
                IterationStatus::Completed => i.result.clone().unwrap_or(serde_json::Value::Null),
                IterationStatus::Failed => serde_json::json!({
                    "error": i.error.clone().unwrap_or_default(),
                }),
                IterationStatus::Dispatched => serde_json::Value::Null,
            })
            .collect();
        serde_json::Value::Array(items)
    }

    /// First failure message encountered, if any.
    pub fn first_error(&self) -> Option<String> {
        self.iterations
            .iter()
            .find(|i| i.status == IterationStatus::Failed)
            .and_then(|i| i.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn evt(
        event_id: i64,
        event_type: &str,
        node_name: Option<&str>,
        parent_event_id: Option<i64>,
        context: Option<serde_json::Value>,
        result: Option<serde_json::Value>,
    ) -> Event {
        Event {
            id: event_id,
            execution_id: 1,
            catalog_id: 1,
            event_id,
            parent_event_id,
            parent_execution_id: None,
            event_type: event_type.to_string(),
            node_id: None,
            node_name: node_name.map(|s| s.to_string()),
            node_type: None,
            status: "".to_string(),
            context,
            meta: None,
            result,
            worker_id: None,
            attempt: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reconstructs_in_flight_iterations() {
        let events = vec![
            evt(
                10,
                "loop_iteration",
                Some("fan_out"),
                None,
                Some(serde_json::json!({"_index": 0, "_item": "a", "_total": 2})),
                None,
            ),
            evt(
                11,
                "loop_iteration",
                Some("fan_out"),
                None,
                Some(serde_json::json!({"_index": 1, "_item": "b", "_total": 2})),
                None,
            ),
            evt(
                12,
                "action_completed",
                Some("fan_out"),
                Some(10),
                None,
                Some(serde_json::json!({"ok": true})),
            ),
        ];

        let frame = IteratorFrame::from_events("fan_out", &events).unwrap();
        assert_eq!(frame.iterations.len(), 2);
        assert_eq!(frame.iterations[0].status, IterationStatus::Completed);
        assert_eq!(frame.iterations[1].status, IterationStatus::Dispatched);
        assert!(!frame.is_ready_to_complete(2));
    }

    #[test]
    fn fail_fast_completes_once_in_flight_drains() {
        let events = vec![
            evt(
                10,
                "loop_iteration",
                Some("fan_out"),
                None,
                Some(serde_json::json!({"_index": 0, "_item": "a", "_total": 1, "_on_error": "fail_fast"})),
                None,
            ),
            evt(
                11,
                "action_error",
                Some("fan_out"),
                Some(10),
                None,
                Some(serde_json::json!({"error": "boom"})),
            ),
        ];

        let frame = IteratorFrame::from_events("fan_out", &events).unwrap();
        assert!(frame.has_fatal_failure());
        assert!(frame.is_ready_to_complete(1));
        assert_eq!(frame.first_error(), Some("boom".to_string()));
    }
}
