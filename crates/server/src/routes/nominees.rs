//! Public nominee pages and the podium.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::{
    category::{NomineeType, all_groups, find_group, find_subcategory},
    nomination::{Nomination, NominationFilter, PublicNominee},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

pub const PODIUM_SIZE: i64 = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nominees", get(list_nominees))
        .route("/nominees/{slug}", get(get_nominee))
        .route("/podium", get(get_podium))
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct NomineeQuery {
    pub subcategory: Option<String>,
    pub group: Option<String>,
    #[serde(rename = "type")]
    pub nominee_type: Option<NomineeType>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<NomineeQuery> for NominationFilter {
    fn from(query: NomineeQuery) -> Self {
        NominationFilter {
            state: None,
            subcategory_id: query.subcategory,
            category_group_id: query.group,
            nominee_type: query.nominee_type,
            search: query.search,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

/// A nominee with every category they are approved in.
#[derive(Debug, Serialize, TS)]
pub struct NomineeProfile {
    pub live_url: String,
    pub display_name: String,
    pub nominations: Vec<PublicNominee>,
}

#[derive(Debug, Serialize, TS)]
pub struct Podium {
    pub subcategory_id: String,
    pub label: String,
    pub entries: Vec<PublicNominee>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodiumQuery {
    pub subcategory: Option<String>,
}

pub async fn list_nominees(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<NomineeQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Vec<PublicNominee>>>, ApiError> {
    if let Some(group) = query.group.as_deref() {
        if find_group(group).is_none() {
            return Err(ApiError::BadRequest(format!("Unknown category group `{group}`")));
        }
    }
    let nominees = Nomination::public_listing(state.pool(), &query.into()).await?;
    Ok(ResponseJson(ApiResponse::success(nominees)))
}

pub async fn get_nominee(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<NomineeProfile>>, ApiError> {
    let nominations = Nomination::public_by_slug(state.pool(), &slug).await?;
    let Some(first) = nominations.first() else {
        return Err(ApiError::NotFound(format!("No nominee at `{slug}`")));
    };
    Ok(ResponseJson(ApiResponse::success(NomineeProfile {
        live_url: first.live_url.clone(),
        display_name: first.display_name.clone(),
        nominations,
    })))
}

/// Top three of one subcategory, or of every subcategory when none is given.
pub async fn get_podium(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PodiumQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<Vec<Podium>>>, ApiError> {
    let subcategories: Vec<_> = match query.subcategory.as_deref() {
        Some(id) => vec![
            find_subcategory(id)
                .ok_or_else(|| ApiError::NotFound(format!("Unknown category `{id}`")))?,
        ],
        None => all_groups()
            .iter()
            .flat_map(|group| group.subcategories.iter())
            .collect(),
    };

    let mut podiums = Vec::with_capacity(subcategories.len());
    for sub in subcategories {
        let entries = Nomination::podium(state.pool(), sub.id, PODIUM_SIZE).await?;
        podiums.push(Podium {
            subcategory_id: sub.id.to_string(),
            label: sub.label.to_string(),
            entries,
        });
    }
    Ok(ResponseJson(ApiResponse::success(podiums)))
}
