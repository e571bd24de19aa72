use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use axum_extra::extract::WithRejection;
use db::models::{
    nomination::{AdminNomination, Nomination, NominationFilter},
    nominee::{Nominee, UpdateNominee},
};
use services::services::nomination::{NominationDetail, ReviewNomination};
use tracing::instrument;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AdminContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nominations", get(list_nominations))
        .route(
            "/nominations/{id}",
            get(get_nomination)
                .patch(review_nomination)
                .delete(delete_nomination),
        )
        .route("/nominees/{id}", patch(update_nominee))
}

pub async fn list_nominations(
    State(state): State<AppState>,
    WithRejection(Query(filter), _): WithRejection<Query<NominationFilter>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Vec<AdminNomination>>>, ApiError> {
    let rows = Nomination::list_admin(state.pool(), &filter).await?;
    Ok(ResponseJson(ApiResponse::success(rows)))
}

pub async fn get_nomination(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<NominationDetail>>, ApiError> {
    let detail = state.nominations.detail(id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

#[instrument(skip_all, fields(nomination_id = %id, actor = %admin.actor))]
pub async fn review_nomination(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<Uuid>,
    WithRejection(Json(review), _): WithRejection<Json<ReviewNomination>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Nomination>>, ApiError> {
    let nomination = state.nominations.review(id, review, &admin.actor).await?;
    Ok(ResponseJson(ApiResponse::success(nomination)))
}

#[instrument(skip_all, fields(nomination_id = %id, actor = %admin.actor))]
pub async fn delete_nomination(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.nominations.delete(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

#[instrument(skip_all, fields(nominee_id = %id, actor = %admin.actor))]
pub async fn update_nominee(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<Uuid>,
    WithRejection(Json(update), _): WithRejection<Json<UpdateNominee>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Nominee>>, ApiError> {
    let nominee = state.nominations.update_nominee(id, update).await?;
    Ok(ResponseJson(ApiResponse::success(nominee)))
}
