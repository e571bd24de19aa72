use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use axum_extra::extract::WithRejection;
use services::services::nomination::{NominationReceipt, SubmitNomination};
use tracing::instrument;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new().route("/nominations", post(submit_nomination))
}

#[instrument(skip_all, fields(subcategory = %payload.subcategory_id))]
pub async fn submit_nomination(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SubmitNomination>, ApiError>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<NominationReceipt>>), ApiError> {
    let receipt = state.nominations.submit(payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(receipt))))
}
