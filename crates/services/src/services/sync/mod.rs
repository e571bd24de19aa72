//! Outbound contact sync: the HubSpot and Loops clients and the worker that
//! drains the outbox tables into them.

pub mod hubspot;
pub mod loops;
pub mod worker;

use async_trait::async_trait;
use db::models::outbox::{OutboxEventType, SyncTarget};
use reqwest::StatusCode;
use thiserror::Error;

use super::contact::ContactPayload;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("undecodable payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("{0} sync is not configured")]
    Disabled(SyncTarget),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl SyncError {
    /// Network failures, throttling and server errors are worth retrying;
    /// other client errors will fail the same way next time.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) | SyncError::Database(_) => true,
            SyncError::Http { status, .. } => *status == 429 || *status >= 500,
            SyncError::Response(_) | SyncError::Payload(_) | SyncError::Disabled(_) => false,
        }
    }

    pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
        SyncError::Http {
            status: status.as_u16(),
            body: truncate(body, 500),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SyncError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None if e.is_decode() => SyncError::Response(e.to_string()),
            None => SyncError::Transport(e.to_string()),
        }
    }
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// An external platform that accepts contact pushes.
#[async_trait]
pub trait ContactSink: Send + Sync {
    fn target(&self) -> SyncTarget;

    async fn deliver(
        &self,
        event: OutboxEventType,
        contact: &ContactPayload,
    ) -> Result<(), SyncError>;
}

/// Read the body of a failed response into a [`SyncError`].
pub(crate) async fn error_for_response(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = %body, "Contact sync request rejected");
    SyncError::from_status(status, body)
}
