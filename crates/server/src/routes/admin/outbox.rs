use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use db::models::outbox::{OutboxEntry, OutboxStatus, SyncTarget};
use serde::{Deserialize, Serialize};
use services::services::sync::worker::SyncReport;
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

const DEFAULT_LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/outbox/{target}", get(list_outbox))
        .route("/outbox/{target}/sync", post(sync_now))
        .route("/outbox/{target}/requeue", post(requeue_failed))
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct OutboxQuery {
    pub status: Option<OutboxStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, TS)]
pub struct RequeueResult {
    pub target: SyncTarget,
    pub requeued: u64,
}

pub async fn list_outbox(
    State(state): State<AppState>,
    Path(target): Path<SyncTarget>,
    WithRejection(Query(query), _): WithRejection<Query<OutboxQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Vec<OutboxEntry>>>, ApiError> {
    let rows = OutboxEntry::list(
        state.pool(),
        target,
        query.status,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(rows)))
}

/// Run one worker pass immediately instead of waiting for the next tick.
pub async fn sync_now(
    State(state): State<AppState>,
    Path(target): Path<SyncTarget>,
) -> Result<ResponseJson<ApiResponse<SyncReport>>, ApiError> {
    let report = state.sync.run_once(target).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn requeue_failed(
    State(state): State<AppState>,
    Path(target): Path<SyncTarget>,
) -> Result<ResponseJson<ApiResponse<RequeueResult>>, ApiError> {
    let requeued = OutboxEntry::requeue_failed(state.pool(), target).await?;
    info!(sync_target = %target, requeued = requeued, "Failed outbox rows requeued");
    Ok(ResponseJson(ApiResponse::success(RequeueResult { target, requeued })))
}
