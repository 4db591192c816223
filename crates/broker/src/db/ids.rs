//! Shared snowflake ID generation.
//!
//! Every durable identifier (event_id, queue_id, command_id) is minted by
//! the same Postgres sequence function so ordering stays comparable across
//! tables without a separate ID-allocator service.

use crate::db::DbPool;
use crate::error::AppResult;

/// Generate a new 64-bit sortable ID via `noetl.snowflake_id()`.
pub async fn next_id(pool: &DbPool) -> AppResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT noetl.snowflake_id()")
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
