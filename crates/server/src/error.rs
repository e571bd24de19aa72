use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::setting::SettingValueError;
use services::services::{
    nomination::NominationError, sync::SyncError, validation::ValidationErrors,
    voting::VoteError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Nomination(#[from] NominationError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Setting(#[from] SettingValueError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    JsonBody(#[from] JsonRejection),
    #[error(transparent)]
    QueryString(#[from] QueryRejection),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Missing or invalid admin token")]
    Unauthorized,
    #[error("Admin API is disabled")]
    AdminDisabled,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Nomination(err) => match err {
                NominationError::Closed => StatusCode::FORBIDDEN,
                NominationError::Validation(_)
                | NominationError::UnknownSubcategory(_)
                | NominationError::TypeMismatch { .. }
                | NominationError::AdditionalVotesOutOfRange => StatusCode::BAD_REQUEST,
                NominationError::Duplicate | NominationError::SlugTaken => StatusCode::CONFLICT,
                NominationError::NotFound | NominationError::NomineeNotFound => {
                    StatusCode::NOT_FOUND
                }
                NominationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Vote(err) => match err {
                VoteError::Closed => StatusCode::FORBIDDEN,
                VoteError::Validation(_)
                | VoteError::NotApproved
                | VoteError::SubcategoryMismatch(_) => StatusCode::BAD_REQUEST,
                VoteError::NominationNotFound => StatusCode::NOT_FOUND,
                VoteError::AlreadyVoted => StatusCode::CONFLICT,
                VoteError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Sync(err) => match err {
                SyncError::Disabled(_) => StatusCode::SERVICE_UNAVAILABLE,
                SyncError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Setting(SettingValueError::UnknownKey(_)) => StatusCode::NOT_FOUND,
            ApiError::Setting(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::JsonBody(rejection) => rejection.status(),
            ApiError::QueryString(rejection) => rejection.status(),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::AdminDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::Nomination(NominationError::Validation(errors))
            | ApiError::Vote(VoteError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Some(errors) = self.validation_errors() {
            let body = ApiResponse::<(), ValidationErrors>::error_with_data(
                "Please correct the highlighted fields",
                errors.clone(),
            );
            return (status, Json(body)).into_response();
        }

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
            match status {
                StatusCode::BAD_GATEWAY => format!("Upstream request failed: {self}"),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
