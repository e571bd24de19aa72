use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use utils::text::normalize_email;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Voter {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpsertVoter {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub country: Option<String>,
}

const VOTER_COLUMNS: &str =
    "id, email, firstname, lastname, linkedin, company, job_title, country, created_at, updated_at";

impl Voter {
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Voter>(&format!(
            "SELECT {VOTER_COLUMNS} FROM voters WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
    }

    pub async fn upsert_by_email<'e, E>(executor: E, data: &UpsertVoter) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Voter>(&format!(
            r#"INSERT INTO voters
                (id, email, firstname, lastname, linkedin, company, job_title, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(email) DO UPDATE SET
                firstname  = excluded.firstname,
                lastname   = excluded.lastname,
                linkedin   = COALESCE(excluded.linkedin, voters.linkedin),
                company    = COALESCE(excluded.company, voters.company),
                job_title  = COALESCE(excluded.job_title, voters.job_title),
                country    = COALESCE(excluded.country, voters.country),
                updated_at = datetime('now', 'subsec')
            RETURNING {VOTER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(normalize_email(&data.email))
        .bind(data.firstname.trim())
        .bind(data.lastname.trim())
        .bind(&data.linkedin)
        .bind(&data.company)
        .bind(&data.job_title)
        .bind(&data.country)
        .fetch_one(executor)
        .await
    }

    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM voters")
            .fetch_one(executor)
            .await
    }
}
