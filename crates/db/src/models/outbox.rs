//! Outbox tables staging contact pushes to HubSpot and Loops.
//!
//! Both targets share one row shape and live in separate tables so a stuck
//! integration never blocks the other. Rows move
//! `pending -> processing -> done`, or to `failed` once retries are exhausted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncTarget {
    Hubspot,
    Loops,
}

impl SyncTarget {
    pub fn table(self) -> &'static str {
        match self {
            SyncTarget::Hubspot => "hubspot_outbox",
            SyncTarget::Loops => "loops_outbox",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString,
)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString,
)]
#[sqlx(type_name = "outbox_event", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutboxEventType {
    NominationSubmitted,
    NomineeApproved,
    VoteCast,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event_type: OutboxEventType,
    /// JSON document, decoded by the consumer with [`OutboxEntry::decode_payload`]
    pub payload: String,
    pub status: OutboxStatus,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct OutboxStats {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
}

const OUTBOX_COLUMNS: &str = "id, event_type, payload, status, attempt_count, last_error, \
     next_attempt_at, created_at, updated_at";

impl OutboxEntry {
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    pub async fn enqueue<'e, E, P>(
        executor: E,
        target: SyncTarget,
        event_type: OutboxEventType,
        payload: &P,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
        P: Serialize,
    {
        let payload =
            serde_json::to_string(payload).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let now = Utc::now();
        sqlx::query_as::<_, OutboxEntry>(&format!(
            r#"INSERT INTO {table} (id, event_type, payload, status, next_attempt_at, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $4, $4)
            RETURNING {OUTBOX_COLUMNS}"#,
            table = target.table()
        ))
        .bind(Uuid::new_v4())
        .bind(event_type)
        .bind(payload)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        target: SyncTarget,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OutboxEntry>(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM {table} WHERE id = $1",
            table = target.table()
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Newest first, optionally narrowed to one status.
    pub async fn list(
        pool: &SqlitePool,
        target: SyncTarget,
        status: Option<OutboxStatus>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, OutboxEntry>(&format!(
            r#"SELECT {OUTBOX_COLUMNS} FROM {table}
            WHERE ($1 IS NULL OR status = $1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2"#,
            table = target.table()
        ))
        .bind(status)
        .bind(limit.clamp(1, 1000))
        .fetch_all(pool)
        .await
    }

    /// Flip up to `limit` due pending rows to `processing` and return them
    /// oldest first.
    pub async fn claim_batch(
        pool: &SqlitePool,
        target: SyncTarget,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut claimed = sqlx::query_as::<_, OutboxEntry>(&format!(
            r#"UPDATE {table}
            SET status = 'processing', updated_at = $1
            WHERE id IN (
                SELECT id FROM {table}
                WHERE status = 'pending' AND next_attempt_at <= $1
                ORDER BY next_attempt_at, rowid
                LIMIT $2
            )
            RETURNING {OUTBOX_COLUMNS}"#,
            table = target.table()
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        claimed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claimed)
    }

    pub async fn mark_done(pool: &SqlitePool, target: SyncTarget, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"UPDATE {table}
            SET status = 'done', attempt_count = attempt_count + 1, last_error = NULL, updated_at = $2
            WHERE id = $1"#,
            table = target.table()
        ))
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put the row back in the queue after a transient failure.
    pub async fn mark_retry(
        pool: &SqlitePool,
        target: SyncTarget,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"UPDATE {table}
            SET status = 'pending', attempt_count = attempt_count + 1, last_error = $2,
                next_attempt_at = $3, updated_at = $4
            WHERE id = $1"#,
            table = target.table()
        ))
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        pool: &SqlitePool,
        target: SyncTarget,
        id: Uuid,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"UPDATE {table}
            SET status = 'failed', attempt_count = attempt_count + 1, last_error = $2, updated_at = $3
            WHERE id = $1"#,
            table = target.table()
        ))
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Manual reprocessing: failed rows become pending again with a fresh
    /// attempt budget. The last error is kept for reference.
    pub async fn requeue_failed(pool: &SqlitePool, target: SyncTarget) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(&format!(
            r#"UPDATE {table}
            SET status = 'pending', attempt_count = 0, next_attempt_at = $1, updated_at = $1
            WHERE status = 'failed'"#,
            table = target.table()
        ))
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Rows left in `processing` by a consumer that died mid-batch.
    pub async fn release_stale(
        pool: &SqlitePool,
        target: SyncTarget,
        older_than: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&format!(
            r#"UPDATE {table}
            SET status = 'pending', updated_at = $2
            WHERE status = 'processing' AND updated_at < $1"#,
            table = target.table()
        ))
        .bind(older_than)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn stats(pool: &SqlitePool, target: SyncTarget) -> Result<OutboxStats, sqlx::Error> {
        let rows: Vec<(OutboxStatus, i64)> = sqlx::query_as(&format!(
            "SELECT status, COUNT(*) FROM {table} GROUP BY status",
            table = target.table()
        ))
        .fetch_all(pool)
        .await?;

        let mut stats = OutboxStats::default();
        for (status, count) in rows {
            match status {
                OutboxStatus::Pending => stats.pending = count,
                OutboxStatus::Processing => stats.processing = count,
                OutboxStatus::Done => stats.done = count,
                OutboxStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }
}
