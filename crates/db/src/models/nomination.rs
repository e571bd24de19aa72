use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::category::NomineeType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString, Default,
)]
#[sqlx(type_name = "nomination_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NominationState {
    #[default]
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Nomination {
    pub id: Uuid,
    pub nominator_id: Uuid,
    pub nominee_id: Uuid,
    pub category_group_id: String,
    pub subcategory_id: String,
    pub state: NominationState,
    /// Votes cast through the public form
    pub votes: i64,
    /// Admin-managed offset added to `votes` for public totals
    pub additional_votes: i64,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Nomination {
    pub fn total_votes(&self) -> i64 {
        self.votes + self.additional_votes
    }
}

#[derive(Debug, Clone)]
pub struct CreateNomination {
    pub nominator_id: Uuid,
    pub nominee_id: Uuid,
    pub category_group_id: String,
    pub subcategory_id: String,
}

/// An approved nomination as shown on the public site. Contact details are
/// deliberately absent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PublicNominee {
    pub nomination_id: Uuid,
    pub nominee_id: Uuid,
    pub nominee_type: NomineeType,
    pub display_name: String,
    pub live_url: String,
    pub category_group_id: String,
    pub subcategory_id: String,
    pub image_url: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub why_vote: Option<String>,
    pub bio: Option<String>,
    pub total_votes: i64,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Admin listing row: the nomination plus enough of both parties to review it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AdminNomination {
    pub id: Uuid,
    pub state: NominationState,
    pub category_group_id: String,
    pub subcategory_id: String,
    pub votes: i64,
    pub additional_votes: i64,
    pub total_votes: i64,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub nominee_id: Uuid,
    pub nominee_type: NomineeType,
    pub nominee_name: String,
    pub nominee_email: Option<String>,
    pub live_url: String,
    pub nominator_id: Uuid,
    pub nominator_name: String,
    pub nominator_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct NominationFilter {
    pub state: Option<NominationState>,
    pub subcategory_id: Option<String>,
    pub category_group_id: Option<String>,
    pub nominee_type: Option<NomineeType>,
    /// Case-insensitive match on nominee name, company and email
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const NOMINATION_COLUMNS: &str = "id, nominator_id, nominee_id, category_group_id, \
     subcategory_id, state, votes, additional_votes, admin_notes, rejection_reason, \
     approved_at, approved_by, created_at, updated_at";

const DISPLAY_NAME_SQL: &str = "CASE ne.nominee_type \
     WHEN 'person' THEN TRIM(COALESCE(ne.firstname, '') || ' ' || COALESCE(ne.lastname, '')) \
     ELSE COALESCE(ne.company_name, '') END";

const MAX_PAGE_SIZE: i64 = 500;

/// Columns SQLite names when the same nominee is nominated twice in one subcategory.
pub const ONE_NOMINATION_PER_CATEGORY: &str = "nominations.nominee_id, nominations.subcategory_id";

pub fn is_duplicate_nomination(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains(ONE_NOMINATION_PER_CATEGORY)
        }
        _ => false,
    }
}

fn public_select() -> String {
    format!(
        r#"SELECT
            nm.id                                    AS nomination_id,
            ne.id                                    AS nominee_id,
            ne.nominee_type                          AS nominee_type,
            {DISPLAY_NAME_SQL}                       AS display_name,
            ne.live_url                              AS live_url,
            nm.category_group_id                     AS category_group_id,
            nm.subcategory_id                        AS subcategory_id,
            COALESCE(ne.headshot_url, ne.logo_url)   AS image_url,
            ne.job_title                             AS job_title,
            COALESCE(ne.person_company, ne.company_name) AS company,
            COALESCE(ne.person_country, ne.company_country) AS country,
            COALESCE(ne.why_me, ne.why_us)           AS why_vote,
            ne.bio                                   AS bio,
            nm.votes + nm.additional_votes           AS total_votes,
            nm.approved_at                           AS approved_at
        FROM nominations nm
        JOIN nominees ne ON ne.id = nm.nominee_id
        WHERE nm.state = 'approved'"#
    )
}

/// Append the optional WHERE clauses shared by the public and admin listings.
/// The builder must already contain a WHERE clause. `search_emails` also
/// matches the search term against both parties' emails (admin only).
fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filter: &NominationFilter,
    search_emails: bool,
) {
    if let Some(subcategory_id) = &filter.subcategory_id {
        builder.push(" AND nm.subcategory_id = ");
        builder.push_bind(subcategory_id.clone());
    }
    if let Some(group_id) = &filter.category_group_id {
        builder.push(" AND nm.category_group_id = ");
        builder.push_bind(group_id.clone());
    }
    if let Some(nominee_type) = filter.nominee_type {
        builder.push(" AND ne.nominee_type = ");
        builder.push_bind(nominee_type);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        builder.push(format!(" AND (LOWER({DISPLAY_NAME_SQL}) LIKE "));
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR LOWER(COALESCE(ne.person_company, ne.company_name, '')) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\'");
        if search_emails {
            builder.push(" OR ne.person_email LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR nr.email LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
    }
}

/// Escapes LIKE wildcards so user search text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_paging(builder: &mut QueryBuilder<'_, Sqlite>, filter: &NominationFilter) {
    let limit = filter.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset.unwrap_or(0).max(0));
}

impl Nomination {
    pub async fn create<'e, E>(executor: E, data: &CreateNomination) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nomination>(&format!(
            r#"INSERT INTO nominations (id, nominator_id, nominee_id, category_group_id, subcategory_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOMINATION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.nominator_id)
        .bind(data.nominee_id)
        .bind(&data.category_group_id)
        .bind(&data.subcategory_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nomination>(&format!(
            "SELECT {NOMINATION_COLUMNS} FROM nominations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_nominee<'e, E>(executor: E, nominee_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nomination>(&format!(
            "SELECT {NOMINATION_COLUMNS} FROM nominations WHERE nominee_id = $1 ORDER BY created_at"
        ))
        .bind(nominee_id)
        .fetch_all(executor)
        .await
    }

    /// Review listing across every state, newest first.
    pub async fn list_admin(
        pool: &SqlitePool,
        filter: &NominationFilter,
    ) -> Result<Vec<AdminNomination>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            r#"SELECT
                nm.id, nm.state, nm.category_group_id, nm.subcategory_id, nm.votes,
                nm.additional_votes, nm.votes + nm.additional_votes AS total_votes,
                nm.admin_notes, nm.rejection_reason, nm.approved_at, nm.approved_by,
                ne.id AS nominee_id, ne.nominee_type, {DISPLAY_NAME_SQL} AS nominee_name,
                ne.person_email AS nominee_email, ne.live_url,
                nr.id AS nominator_id, nr.firstname || ' ' || nr.lastname AS nominator_name,
                nr.email AS nominator_email, nm.created_at, nm.updated_at
            FROM nominations nm
            JOIN nominees ne ON ne.id = nm.nominee_id
            JOIN nominators nr ON nr.id = nm.nominator_id
            WHERE 1 = 1"#
        ));

        if let Some(state) = filter.state {
            builder.push(" AND nm.state = ");
            builder.push_bind(state);
        }
        push_filters(&mut builder, filter, true);
        builder.push(" ORDER BY nm.created_at DESC, nm.rowid DESC");
        push_paging(&mut builder, filter);

        builder
            .build_query_as::<AdminNomination>()
            .fetch_all(pool)
            .await
    }

    /// Approved nominations ordered by total votes, then name.
    pub async fn public_listing(
        pool: &SqlitePool,
        filter: &NominationFilter,
    ) -> Result<Vec<PublicNominee>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(public_select());
        push_filters(&mut builder, filter, false);
        builder.push(" ORDER BY total_votes DESC, display_name COLLATE NOCASE ASC");
        push_paging(&mut builder, filter);

        builder
            .build_query_as::<PublicNominee>()
            .fetch_all(pool)
            .await
    }

    /// Every approved nomination of the nominee behind `slug`.
    pub async fn public_by_slug(
        pool: &SqlitePool,
        slug: &str,
    ) -> Result<Vec<PublicNominee>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(public_select());
        builder.push(" AND ne.live_url = ");
        builder.push_bind(slug.to_string());
        builder.push(" ORDER BY total_votes DESC");

        builder
            .build_query_as::<PublicNominee>()
            .fetch_all(pool)
            .await
    }

    /// Top `n` approved nominations in a subcategory.
    pub async fn podium(
        pool: &SqlitePool,
        subcategory_id: &str,
        n: i64,
    ) -> Result<Vec<PublicNominee>, sqlx::Error> {
        let filter = NominationFilter {
            subcategory_id: Some(subcategory_id.to_string()),
            limit: Some(n),
            ..Default::default()
        };
        Self::public_listing(pool, &filter).await
    }

    /// Move a nomination to `state`. Approving stamps `approved_at`/`approved_by`
    /// and clears any earlier rejection reason.
    pub async fn set_state<'e, E>(
        executor: E,
        id: Uuid,
        state: NominationState,
        actor: Option<&str>,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Nomination>(&format!(
            r#"UPDATE nominations SET
                state            = $2,
                approved_at      = CASE WHEN $2 = 'approved' THEN $3 ELSE approved_at END,
                approved_by      = CASE WHEN $2 = 'approved' THEN $4 ELSE approved_by END,
                rejection_reason = CASE WHEN $2 = 'rejected' THEN $5 ELSE NULL END,
                updated_at       = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {NOMINATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(state)
        .bind(now)
        .bind(actor)
        .bind(rejection_reason)
        .fetch_optional(executor)
        .await
    }

    pub async fn update_admin_fields<'e, E>(
        executor: E,
        id: Uuid,
        additional_votes: Option<i64>,
        admin_notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nomination>(&format!(
            r#"UPDATE nominations SET
                additional_votes = COALESCE($2, additional_votes),
                admin_notes      = COALESCE($3, admin_notes),
                updated_at       = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {NOMINATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(additional_votes)
        .bind(admin_notes)
        .fetch_optional(executor)
        .await
    }

    /// Add one real vote and return the new public total.
    pub async fn increment_votes<'e, E>(executor: E, id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            r#"UPDATE nominations
            SET votes = votes + 1, updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING votes + additional_votes"#,
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Delete a nomination; its votes go with it via ON DELETE CASCADE.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM nominations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_guards_wildcards() {
        assert_eq!(escape_like("jane doe"), "jane doe");
        assert_eq!(escape_like("100%_sure"), "100\\%\\_sure");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
