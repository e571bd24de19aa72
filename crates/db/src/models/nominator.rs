use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use utils::text::normalize_email;
use uuid::Uuid;

/// The person submitting a nomination.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Nominator {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpsertNominator {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

const NOMINATOR_COLUMNS: &str = "id, email, firstname, lastname, linkedin, company, job_title, \
     phone, country, created_at, updated_at";

impl Nominator {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominator>(&format!(
            "SELECT {NOMINATOR_COLUMNS} FROM nominators WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominator>(&format!(
            "SELECT {NOMINATOR_COLUMNS} FROM nominators WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
    }

    /// Insert a nominator, or refresh the profile of the one with this email.
    ///
    /// Optional fields left empty on a later submission keep their stored value.
    pub async fn upsert_by_email<'e, E>(
        executor: E,
        data: &UpsertNominator,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominator>(&format!(
            r#"INSERT INTO nominators
                (id, email, firstname, lastname, linkedin, company, job_title, phone, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT(email) DO UPDATE SET
                firstname  = excluded.firstname,
                lastname   = excluded.lastname,
                linkedin   = COALESCE(excluded.linkedin, nominators.linkedin),
                company    = COALESCE(excluded.company, nominators.company),
                job_title  = COALESCE(excluded.job_title, nominators.job_title),
                phone      = COALESCE(excluded.phone, nominators.phone),
                country    = COALESCE(excluded.country, nominators.country),
                updated_at = datetime('now', 'subsec')
            RETURNING {NOMINATOR_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(normalize_email(&data.email))
        .bind(data.firstname.trim())
        .bind(data.lastname.trim())
        .bind(&data.linkedin)
        .bind(&data.company)
        .bind(&data.job_title)
        .bind(&data.phone)
        .bind(&data.country)
        .fetch_one(executor)
        .await
    }
}
