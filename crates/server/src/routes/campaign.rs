//! Campaign-wide read endpoints for the public site.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use chrono::Utc;
use db::models::{
    category::{CategoryGroup, all_groups},
    setting::{CampaignSettings, CampaignStatus},
    stats::CampaignStats,
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings))
        .route("/categories", get(get_categories))
        .route("/stats", get(get_stats))
}

/// Effective phase flags: stored switches combined with the scheduled dates.
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<CampaignStatus>>, ApiError> {
    let settings = CampaignSettings::load(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(settings.status(Utc::now()))))
}

pub async fn get_categories() -> ResponseJson<ApiResponse<Vec<CategoryGroup>>> {
    ResponseJson(ApiResponse::success(all_groups().to_vec()))
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<CampaignStats>>, ApiError> {
    let stats = CampaignStats::load(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}
