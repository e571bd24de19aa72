use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{AppState, error::ApiError};

/// Header naming the person behind an admin request, recorded as
/// `approved_by`. Falls back to `admin`.
pub const ADMIN_ACTOR_HEADER: &str = "x-admin-user";

/// Identity of an authenticated admin request.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub actor: String,
}

fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get(ADMIN_ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(100).collect())
        .unwrap_or_else(|| "admin".to_string())
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_ref() else {
        return ApiError::AdminDisabled.into_response();
    };

    let presented = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer.token().to_owned(),
        None => return ApiError::Unauthorized.into_response(),
    };

    let matches: bool = presented
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .into();
    if !matches {
        warn!(path = %req.uri().path(), "Rejected admin request with wrong token");
        return ApiError::Unauthorized.into_response();
    }

    let actor = actor_from(req.headers());
    req.extensions_mut().insert(AdminContext { actor });
    next.run(req).await
}
