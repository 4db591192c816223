//! Queue service: the at-least-once dispatch path between the broker
//! and workers, and the trigger point that re-runs the orchestrator
//! whenever a worker reports completion or failure.

use std::time::Duration;

use tokio::time::interval;

use crate::db::models::event::EventStatus;
use crate::db::models::queue::{
    CompleteRequest, FailRequest, HeartbeatRequest, HeartbeatResponse, LeaseRequest, LeaseResponse,
    LeasedItem, QueueAckResponse,
};
use crate::db::models::Event;
use crate::db::queries::{catalog as catalog_queries, event as event_queries, queue as queries};
use crate::db::DbPool;
use crate::engine::WorkflowOrchestrator;
use crate::error::{AppError, AppResult};
use crate::playbook::parse_playbook;
use crate::sanitize::sanitize_sensitive_data;

/// How often the background sweeper looks for expired leases.
const SWEEP_INTERVAL_SECS: u64 = 15;

#[derive(Clone)]
pub struct QueueService {
    pool: DbPool,
}

impl QueueService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Enqueue a unit of work. Used by the orchestrator when it
    /// produces new commands to dispatch.
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        &self,
        id: i64,
        execution_id: i64,
        node_id: &str,
        catalog_id: i64,
        parent_event_id: i64,
        action: &serde_json::Value,
        context: &serde_json::Value,
        iterator: Option<&serde_json::Value>,
        priority: i32,
        max_attempts: i32,
        not_before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<i64> {
        queries::enqueue(
            &self.pool,
            id,
            execution_id,
            node_id,
            catalog_id,
            parent_event_id,
            action,
            context,
            iterator,
            priority,
            max_attempts,
            not_before,
        )
        .await
    }

    /// `POST /queue/lease` - hand a batch of ready items to a worker.
    ///
    /// This is the authoritative at-least-once dispatch point, so it
    /// also records the `action_started` event for each item handed
    /// out - workers never report their own start, only completion or
    /// failure.
    pub async fn lease(&self, request: LeaseRequest) -> AppResult<LeaseResponse> {
        let items = queries::lease(
            &self.pool,
            &request.worker_id,
            request.count,
            request.visibility_seconds,
        )
        .await?;

        for item in &items {
            let event_id = crate::db::ids::next_id(&self.pool).await?;
            let node_name = item
                .action
                .get("step")
                .and_then(|v| v.as_str())
                .unwrap_or(item.node_id.as_str());

            event_queries::insert_event(
                &self.pool,
                event_id,
                item.execution_id,
                item.catalog_id,
                Some(item.parent_event_id),
                None,
                "action_started",
                Some(&item.node_id),
                Some(node_name),
                None,
                EventStatus::Running.as_str(),
                Some(&item.context),
                None,
                None,
                Some(&request.worker_id),
                Some(item.attempts),
            )
            .await?;
        }

        Ok(LeaseResponse {
            items: items.into_iter().map(LeasedItem::from).collect(),
        })
    }

    /// `POST /queue/heartbeat` - extend a lease while a worker is still
    /// working an item.
    pub async fn heartbeat(&self, request: HeartbeatRequest) -> AppResult<HeartbeatResponse> {
        let queue_id: i64 = request
            .queue_id
            .parse()
            .map_err(|_| AppError::Validation("invalid queue_id".to_string()))?;

        let extended = queries::heartbeat(
            &self.pool,
            queue_id,
            &request.worker_id,
            request.visibility_seconds,
        )
        .await?;

        Ok(HeartbeatResponse {
            status: if extended { "ok" } else { "lost" }.to_string(),
        })
    }

    /// `POST /queue/complete` - a worker reports success. Records
    /// `action_completed`, marks the item done, then re-runs the
    /// orchestrator against the updated event log.
    pub async fn complete(&self, request: CompleteRequest) -> AppResult<QueueAckResponse> {
        let queue_id: i64 = request
            .queue_id
            .parse()
            .map_err(|_| AppError::Validation("invalid queue_id".to_string()))?;

        let item = queries::complete(&self.pool, queue_id, &request.worker_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("queue item {} not leased by worker", queue_id)))?;

        let event_id = crate::db::ids::next_id(&self.pool).await?;
        let node_name = item
            .action
            .get("step")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let context = sanitize_sensitive_data(&item.context);
        let result = sanitize_sensitive_data(&request.result);

        event_queries::insert_event(
            &self.pool,
            event_id,
            item.execution_id,
            item.catalog_id,
            Some(item.parent_event_id),
            None,
            "action_completed",
            Some(&item.node_id),
            node_name.as_deref(),
            None,
            EventStatus::Ok.as_str(),
            Some(&context),
            None,
            Some(&result),
            Some(&request.worker_id),
            Some(item.attempts),
        )
        .await?;

        self.run_orchestrator_pass(item.execution_id, item.catalog_id, event_id)
            .await
    }

    /// `POST /queue/fail` - a worker reports failure. Records
    /// `action_error`, applies retry/backoff or deadletters the item,
    /// then re-runs the orchestrator.
    pub async fn fail(&self, request: FailRequest) -> AppResult<QueueAckResponse> {
        let queue_id: i64 = request
            .queue_id
            .parse()
            .map_err(|_| AppError::Validation("invalid queue_id".to_string()))?;

        let existing = queries::get_by_id(&self.pool, queue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("queue item {} not found", queue_id)))?;

        let backoff = backoff_seconds(existing.attempts);

        let item = queries::fail(&self.pool, queue_id, &request.worker_id, request.retryable, backoff)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("queue item {} not leased by worker", queue_id)))?;

        let event_id = crate::db::ids::next_id(&self.pool).await?;
        let node_name = item
            .action
            .get("step")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let context = sanitize_sensitive_data(&item.context);
        let result = sanitize_sensitive_data(&serde_json::json!({"error": request.error}));

        event_queries::insert_event(
            &self.pool,
            event_id,
            item.execution_id,
            item.catalog_id,
            Some(item.parent_event_id),
            None,
            "action_error",
            Some(&item.node_id),
            node_name.as_deref(),
            None,
            EventStatus::Error.as_str(),
            Some(&context),
            None,
            Some(&result),
            Some(&request.worker_id),
            Some(item.attempts),
        )
        .await?;

        self.run_orchestrator_pass(item.execution_id, item.catalog_id, event_id)
            .await
    }

    /// Reload the event log and playbook for `execution_id`, evaluate
    /// the orchestrator against the just-inserted trigger event, then
    /// persist whatever events it emits and enqueue whatever commands
    /// it produces.
    ///
    /// Also the dispatch path used right after `execution_started` is
    /// recorded: the orchestrator sees an in-progress execution with no
    /// steps yet entered and dispatches the start step the same way it
    /// dispatches the next step after a queue completion/failure.
    pub async fn run_orchestrator_pass(
        &self,
        execution_id: i64,
        catalog_id: i64,
        trigger_event_id: i64,
    ) -> AppResult<QueueAckResponse> {
        let events: Vec<Event> =
            event_queries::get_events_by_execution(&self.pool, execution_id, None, None).await?;

        let trigger = events
            .iter()
            .find(|e| e.event_id == trigger_event_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("trigger event vanished after insert".to_string()))?;

        let catalog_entry = catalog_queries::get_catalog_by_id(&self.pool, catalog_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("catalog entry {} not found", catalog_id)))?;

        let playbook = parse_playbook(&catalog_entry.content)?;
        let orchestrator = WorkflowOrchestrator::new();

        let result = orchestrator
            .evaluate(&self.pool, &events, &playbook, &trigger)
            .await?;

        let mut events_emitted = 0;
        for to_emit in &result.events_to_emit {
            event_queries::insert_event(
                &self.pool,
                to_emit.event_id,
                execution_id,
                catalog_id,
                Some(trigger_event_id),
                None,
                &to_emit.event_type,
                to_emit.node_name.as_deref(),
                to_emit.node_name.as_deref(),
                None,
                &to_emit.status,
                to_emit.context.as_ref(),
                None,
                to_emit.result.as_ref(),
                None,
                None,
            )
            .await?;
            events_emitted += 1;
        }

        let mut commands_enqueued = 0;
        for command in &result.commands {
            let action = serde_json::to_value(&command.tool)
                .map_err(|e| AppError::Validation(format!("failed to serialize command: {}", e)))?;
            let context = command
                .context
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| AppError::Validation(format!("failed to serialize context: {}", e)))?
                .unwrap_or_else(|| serde_json::json!({}));
            let iterator = command
                .iterator
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| AppError::Validation(format!("failed to serialize iterator: {}", e)))?;

            let node_id = match &command.iterator {
                Some(iter) => format!("{}:{}", command.step_name, iter.index),
                None => command.step_name.clone(),
            };

            // Step-level retry/backoff is already decided by the orchestrator
            // (it mints a fresh command per attempt); a queue item itself
            // gets a single attempt here.
            queries::enqueue(
                &self.pool,
                command.command_id,
                command.execution_id,
                &node_id,
                catalog_id,
                command.parent_event_id,
                &action,
                &context,
                iterator.as_ref(),
                0,
                1,
                None,
            )
            .await?;
            commands_enqueued += 1;
        }

        Ok(QueueAckResponse {
            status: "ok".to_string(),
            events_emitted,
            commands_enqueued,
        })
    }

    /// Spawn the background task that returns expired leases to
    /// `ready` (or `dead` when attempts are exhausted).
    pub fn start_sweeper(&self) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                match queries::sweep_expired_leases(&pool).await {
                    Ok(n) if n > 0 => tracing::info!(swept = n, "reclaimed expired queue leases"),
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "queue lease sweep failed"),
                }
            }
        });
    }
}

fn backoff_seconds(attempts: i32) -> f64 {
    let base: f64 = 2.0;
    base.powi(attempts.max(0)).min(60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_seconds_caps() {
        assert_eq!(backoff_seconds(0), 1.0);
        assert!(backoff_seconds(10) <= 60.0);
    }
}
