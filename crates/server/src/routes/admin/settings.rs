use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use axum_extra::extract::WithRejection;
use db::models::setting::{AppSetting, SettingKey, SettingValueError};
use serde::Deserialize;
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::AdminContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(list_settings))
        .route("/settings/{key}", put(update_setting))
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateSetting {
    pub value: String,
}

pub async fn list_settings(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<AppSetting>>>, ApiError> {
    let rows = AppSetting::get_all(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(rows)))
}

pub async fn update_setting(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(key): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateSetting>, ApiError>,
) -> Result<ResponseJson<ApiResponse<AppSetting>>, ApiError> {
    let key: SettingKey = key
        .parse()
        .map_err(|_| SettingValueError::UnknownKey(key.clone()))?;
    let value = key.normalize(&payload.value)?;

    let row = AppSetting::set(state.pool(), key, &value).await?;
    info!(key = %key, value = %row.value, actor = %admin.actor, "Setting updated");
    Ok(ResponseJson(ApiResponse::success(row)))
}
