//! Admin API. Every route requires the `ADMIN_TOKEN` bearer token.

use axum::{
    Router, extract::State, middleware::from_fn_with_state, response::Json as ResponseJson,
    routing::get,
};
use db::models::stats::AdminStats;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::require_admin};

pub mod nominations;
pub mod outbox;
pub mod settings;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_admin_stats))
        .merge(nominations::router())
        .merge(settings::router())
        .merge(outbox::router())
        .layer(from_fn_with_state(state.clone(), require_admin))
}

pub async fn get_admin_stats(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<AdminStats>>, ApiError> {
    let stats = AdminStats::load(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}
