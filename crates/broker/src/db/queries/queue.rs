//! Queue database queries.
//!
//! `lease` uses `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! block each other picking items off the same table.

use chrono::{DateTime, Utc};

use crate::db::models::queue::QueueItem;
use crate::db::DbPool;
use crate::error::AppResult;

/// Insert a new ready item. `node_id` is unique within an execution
/// (I4); a duplicate enqueue of the same step/iteration is a no-op
/// that returns the existing row's id.
#[allow(clippy::too_many_arguments)]
pub async fn enqueue(
    pool: &DbPool,
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
    not_before: Option<DateTime<Utc>>,
) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO noetl.queue (
            id, execution_id, node_id, catalog_id, parent_event_id,
            action, context, iterator, priority, attempts, max_attempts,
            not_before, lease_deadline, status, last_worker_id,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, NULL, 'ready', NULL, $12, $12)
        ON CONFLICT (execution_id, node_id) DO UPDATE SET node_id = noetl.queue.node_id
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(execution_id)
    .bind(node_id)
    .bind(catalog_id)
    .bind(parent_event_id)
    .bind(action)
    .bind(context)
    .bind(iterator)
    .bind(priority)
    .bind(max_attempts)
    .bind(not_before)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Atomically lease up to `count` ready items whose `not_before` has
/// passed, ordered by priority then age, and mark them leased.
pub async fn lease(
    pool: &DbPool,
    worker_id: &str,
    count: i64,
    visibility_seconds: i64,
) -> AppResult<Vec<QueueItem>> {
    let mut tx = pool.begin().await?;

    let candidates: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT id
        FROM noetl.queue
        WHERE status = 'ready'
          AND (not_before IS NULL OR not_before <= NOW())
        ORDER BY priority DESC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(count)
    .fetch_all(&mut *tx)
    .await?;

    if candidates.is_empty() {
        tx.commit().await?;
        return Ok(vec![]);
    }

    let ids: Vec<i64> = candidates.into_iter().map(|(id,)| id).collect();
    let deadline = Utc::now() + chrono::Duration::seconds(visibility_seconds);

    let items: Vec<QueueItem> = sqlx::query_as::<_, QueueItem>(
        r#"
        UPDATE noetl.queue
        SET status = 'leased',
            attempts = attempts + 1,
            lease_deadline = $1,
            last_worker_id = $2,
            updated_at = NOW()
        WHERE id = ANY($3)
        RETURNING id, execution_id, node_id, catalog_id, parent_event_id,
                  action, context, iterator, priority, attempts, max_attempts,
                  not_before, lease_deadline, status, last_worker_id,
                  created_at, updated_at
        "#,
    )
    .bind(deadline)
    .bind(worker_id)
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(items)
}

/// Extend a lease if `worker_id` still owns it. Returns true if extended.
pub async fn heartbeat(
    pool: &DbPool,
    queue_id: i64,
    worker_id: &str,
    visibility_seconds: i64,
) -> AppResult<bool> {
    let deadline = Utc::now() + chrono::Duration::seconds(visibility_seconds);

    let result = sqlx::query(
        r#"
        UPDATE noetl.queue
        SET lease_deadline = $1, updated_at = NOW()
        WHERE id = $2 AND status = 'leased' AND last_worker_id = $3
        "#,
    )
    .bind(deadline)
    .bind(queue_id)
    .bind(worker_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark an item done. Returns the row if the caller still owned the lease.
pub async fn complete(pool: &DbPool, queue_id: i64, worker_id: &str) -> AppResult<Option<QueueItem>> {
    let item = sqlx::query_as::<_, QueueItem>(
        r#"
        UPDATE noetl.queue
        SET status = 'done', lease_deadline = NULL, updated_at = NOW()
        WHERE id = $1 AND status = 'leased' AND last_worker_id = $2
        RETURNING id, execution_id, node_id, catalog_id, parent_event_id,
                  action, context, iterator, priority, attempts, max_attempts,
                  not_before, lease_deadline, status, last_worker_id,
                  created_at, updated_at
        "#,
    )
    .bind(queue_id)
    .bind(worker_id)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

/// Reset a retryable item to `ready` with exponential backoff, or mark
/// it `dead` once `attempts >= max_attempts` (§7 Poison).
pub async fn fail(
    pool: &DbPool,
    queue_id: i64,
    worker_id: &str,
    retryable: bool,
    backoff_seconds: f64,
) -> AppResult<Option<QueueItem>> {
    let not_before = Utc::now() + chrono::Duration::milliseconds((backoff_seconds * 1000.0) as i64);

    let item = sqlx::query_as::<_, QueueItem>(
        r#"
        UPDATE noetl.queue
        SET status = CASE
                WHEN NOT $3 OR attempts >= max_attempts THEN 'dead'
                ELSE 'ready'
            END,
            not_before = CASE
                WHEN NOT $3 OR attempts >= max_attempts THEN not_before
                ELSE $4
            END,
            lease_deadline = NULL,
            updated_at = NOW()
        WHERE id = $1 AND status = 'leased' AND last_worker_id = $2
        RETURNING id, execution_id, node_id, catalog_id, parent_event_id,
                  action, context, iterator, priority, attempts, max_attempts,
                  not_before, lease_deadline, status, last_worker_id,
                  created_at, updated_at
        "#,
    )
    .bind(queue_id)
    .bind(worker_id)
    .bind(retryable)
    .bind(not_before)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

/// Sweep leased items whose deadline has passed: return them to ready
/// with `attempts` already incremented by `lease`, or move to `dead`
/// once they're out of attempts. Returns the number of rows swept.
pub async fn sweep_expired_leases(pool: &DbPool) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE noetl.queue
        SET status = CASE WHEN attempts >= max_attempts THEN 'dead' ELSE 'ready' END,
            lease_deadline = NULL,
            updated_at = NOW()
        WHERE status = 'leased' AND lease_deadline < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetch a single item by id (for handlers that need the full row
/// after a complete/fail call to hand off to the orchestrator).
pub async fn get_by_id(pool: &DbPool, queue_id: i64) -> AppResult<Option<QueueItem>> {
    let item = sqlx::query_as::<_, QueueItem>(
        r#"
        SELECT id, execution_id, node_id, catalog_id, parent_event_id,
               action, context, iterator, priority, attempts, max_attempts,
               not_before, lease_deadline, status, last_worker_id,
               created_at, updated_at
        FROM noetl.queue
        WHERE id = $1
        "#,
    )
    .bind(queue_id)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}
