use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::Json as ResponseJson,
    routing::post,
};
use axum_extra::extract::WithRejection;
use services::services::voting::{CastVote, ClientMeta, VoteReceipt};
use tracing::instrument;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new().route("/votes", post(cast_vote))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Caller address as reported by the reverse proxy in front of the server.
fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip = header_value(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_value(headers, "x-real-ip"));
    let user_agent = header_value(headers, USER_AGENT.as_str())
        .map(|ua| ua.chars().take(500).collect());
    ClientMeta { ip, user_agent }
}

#[instrument(skip_all, fields(nomination_id = %payload.nomination_id))]
pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(payload), _): WithRejection<Json<CastVote>, ApiError>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<VoteReceipt>>), ApiError> {
    let receipt = state.voting.cast(payload, client_meta(&headers)).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(receipt))))
}
