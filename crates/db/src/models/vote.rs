use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

/// One public vote. A voter gets one per subcategory.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Vote {
    pub id: Uuid,
    pub voter_id: Uuid,
    pub nomination_id: Uuid,
    pub subcategory_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateVote {
    pub voter_id: Uuid,
    pub nomination_id: Uuid,
    pub subcategory_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Columns SQLite names when the one-vote-per-subcategory constraint fails.
pub const ONE_VOTE_PER_CATEGORY: &str = "votes.voter_id, votes.subcategory_id";

const VOTE_COLUMNS: &str =
    "id, voter_id, nomination_id, subcategory_id, ip, user_agent, created_at";

impl Vote {
    pub async fn create<'e, E>(executor: E, data: &CreateVote) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Vote>(&format!(
            r#"INSERT INTO votes (id, voter_id, nomination_id, subcategory_id, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VOTE_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.voter_id)
        .bind(data.nomination_id)
        .bind(&data.subcategory_id)
        .bind(&data.ip)
        .bind(&data.user_agent)
        .fetch_one(executor)
        .await
    }

    pub async fn find_for_voter<'e, E>(
        executor: E,
        voter_id: Uuid,
        subcategory_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Vote>(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE voter_id = $1 AND subcategory_id = $2"
        ))
        .bind(voter_id)
        .bind(subcategory_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn count_for_nomination<'e, E>(executor: E, nomination_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE nomination_id = $1")
            .bind(nomination_id)
            .fetch_one(executor)
            .await
    }
}

/// True when `err` is the one-vote-per-subcategory unique violation.
pub fn is_duplicate_vote(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains(ONE_VOTE_PER_CATEGORY)
        }
        _ => false,
    }
}
