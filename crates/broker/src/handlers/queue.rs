//! Queue API handlers.
//!
//! The lease/heartbeat/complete/fail protocol workers use to pull work
//! and report outcomes.

use axum::{extract::State, Json};

use crate::db::models::queue::{
    CompleteRequest, FailRequest, HeartbeatRequest, HeartbeatResponse, LeaseRequest, LeaseResponse,
    QueueAckResponse,
};
use crate::error::AppResult;
use crate::services::QueueService;

/// `POST /queue/lease`
pub async fn lease(
    State(service): State<QueueService>,
    Json(request): Json<LeaseRequest>,
) -> AppResult<Json<LeaseResponse>> {
    let response = service.lease(request).await?;
    Ok(Json(response))
}

/// `POST /queue/heartbeat`
pub async fn heartbeat(
    State(service): State<QueueService>,
    Json(request): Json<HeartbeatRequest>,
) -> AppResult<Json<HeartbeatResponse>> {
    let response = service.heartbeat(request).await?;
    Ok(Json(response))
}

/// `POST /queue/complete`
pub async fn complete(
    State(service): State<QueueService>,
    Json(request): Json<CompleteRequest>,
) -> AppResult<Json<QueueAckResponse>> {
    let response = service.complete(request).await?;
    Ok(Json(response))
}

/// `POST /queue/fail`
pub async fn fail(
    State(service): State<QueueService>,
    Json(request): Json<FailRequest>,
) -> AppResult<Json<QueueAckResponse>> {
    let response = service.fail(request).await?;
    Ok(Json(response))
}
