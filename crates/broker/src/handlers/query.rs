//! Read-only SQL query endpoint for observability.
//!
//! Accepts a single `SELECT` statement against the event log (and
//! other `noetl.*` views); anything else is rejected before it
//! reaches the pool.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::{Column, Row};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// `POST /query`
pub async fn query(
    State(pool): State<DbPool>,
    Json(request): Json<QueryRequest>,
) -> AppResult<Json<QueryResponse>> {
    let trimmed = request.sql.trim_start();
    if !trimmed.to_ascii_lowercase().starts_with("select") {
        return Err(AppError::Validation(
            "only SELECT statements are allowed".to_string(),
        ));
    }
    if trimmed.contains(';') && trimmed.matches(';').count() > 1 {
        return Err(AppError::Validation(
            "only a single statement is allowed".to_string(),
        ));
    }

    let mut query = sqlx::query(&request.sql);
    for param in &request.params {
        query = bind_json_param(query, param);
    }

    let rows = query.fetch_all(&pool).await?;

    let columns: Vec<String> = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let result_rows: Vec<Vec<serde_json::Value>> = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| row_value_to_json(row, i))
                .collect()
        })
        .collect();

    Ok(Json(QueryResponse {
        columns,
        rows: result_rows,
    }))
}

fn bind_json_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        serde_json::Value::String(s) => query.bind(s.as_str()),
        serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
        serde_json::Value::Number(n) => query.bind(n.as_f64()),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Null => query.bind(Option::<String>::None),
        other => query.bind(other.to_string()),
    }
}

fn row_value_to_json(row: &sqlx::postgres::PgRow, index: usize) -> serde_json::Value {
    row.try_get::<serde_json::Value, _>(index)
        .or_else(|_| row.try_get::<String, _>(index).map(serde_json::Value::String))
        .or_else(|_| row.try_get::<i64, _>(index).map(|v| serde_json::json!(v)))
        .or_else(|_| row.try_get::<f64, _>(index).map(|v| serde_json::json!(v)))
        .or_else(|_| row.try_get::<bool, _>(index).map(serde_json::Value::Bool))
        .or_else(|_| {
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .map(|v| serde_json::json!(v.to_rfc3339()))
        })
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_select() {
        let sql = "DELETE FROM noetl.event";
        assert!(!sql.trim_start().to_ascii_lowercase().starts_with("select"));
    }

    #[test]
    fn test_accepts_select() {
        let sql = "SELECT event_id FROM noetl.event WHERE execution_id = $1";
        assert!(sql.trim_start().to_ascii_lowercase().starts_with("select"));
    }
}
