use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use ts_rs::TS;
use utils::text::{normalize_email, slugify, website_host};
use uuid::Uuid;

use super::category::NomineeType;

/// A person or company that has been nominated at least once.
///
/// Person and company columns share one table; the ones that do not apply to
/// `nominee_type` stay NULL.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Nominee {
    pub id: Uuid,
    pub nominee_type: NomineeType,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub person_email: Option<String>,
    pub person_linkedin: Option<String>,
    pub job_title: Option<String>,
    pub person_company: Option<String>,
    pub person_country: Option<String>,
    pub headshot_url: Option<String>,
    pub why_me: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub company_domain: Option<String>,
    pub company_linkedin: Option<String>,
    pub company_country: Option<String>,
    pub company_size: Option<String>,
    pub company_industry: Option<String>,
    pub logo_url: Option<String>,
    pub why_us: Option<String>,
    /// Public page slug, unique across nominees
    pub live_url: String,
    pub bio: Option<String>,
    pub achievements: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreatePersonNominee {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub linkedin: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub headshot_url: Option<String>,
    pub why_me: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateCompanyNominee {
    pub name: String,
    pub website: String,
    pub linkedin: Option<String>,
    pub country: Option<String>,
    pub size: Option<String>,
    pub industry: Option<String>,
    pub logo_url: Option<String>,
    pub why_us: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CreateNominee {
    Person(CreatePersonNominee),
    Company(CreateCompanyNominee),
}

impl CreateNominee {
    pub fn nominee_type(&self) -> NomineeType {
        match self {
            CreateNominee::Person(_) => NomineeType::Person,
            CreateNominee::Company(_) => NomineeType::Company,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            CreateNominee::Person(p) => format!("{} {}", p.firstname.trim(), p.lastname.trim()),
            CreateNominee::Company(c) => c.name.trim().to_string(),
        }
    }
}

/// Admin edits; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateNominee {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub job_title: Option<String>,
    pub person_company: Option<String>,
    pub headshot_url: Option<String>,
    pub why_me: Option<String>,
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
    pub why_us: Option<String>,
    pub bio: Option<String>,
    pub achievements: Option<String>,
    pub live_url: Option<String>,
}

const NOMINEE_COLUMNS: &str = "id, nominee_type, firstname, lastname, person_email, \
     person_linkedin, job_title, person_company, person_country, headshot_url, why_me, \
     company_name, company_website, company_domain, company_linkedin, company_country, \
     company_size, company_industry, logo_url, why_us, live_url, bio, achievements, \
     created_at, updated_at";

impl Nominee {
    pub fn display_name(&self) -> String {
        match self.nominee_type {
            NomineeType::Person => format!(
                "{} {}",
                self.firstname.as_deref().unwrap_or_default(),
                self.lastname.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string(),
            NomineeType::Company => self.company_name.clone().unwrap_or_default(),
        }
    }

    /// Email used when pushing the nominee to the CRM. Companies have none.
    pub fn contact_email(&self) -> Option<&str> {
        self.person_email.as_deref()
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominee>(&format!(
            "SELECT {NOMINEE_COLUMNS} FROM nominees WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominee>(&format!(
            "SELECT {NOMINEE_COLUMNS} FROM nominees WHERE live_url = $1"
        ))
        .bind(slug)
        .fetch_optional(executor)
        .await
    }

    /// Look up an existing nominee with the same identity: email for people,
    /// website host for companies.
    pub async fn find_matching<'e, E>(
        executor: E,
        data: &CreateNominee,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        match data {
            CreateNominee::Person(p) => {
                sqlx::query_as::<_, Nominee>(&format!(
                    "SELECT {NOMINEE_COLUMNS} FROM nominees WHERE person_email = $1"
                ))
                .bind(normalize_email(&p.email))
                .fetch_optional(executor)
                .await
            }
            CreateNominee::Company(c) => {
                match website_host(&c.website) {
                    Some(domain) => {
                        sqlx::query_as::<_, Nominee>(&format!(
                            "SELECT {NOMINEE_COLUMNS} FROM nominees WHERE company_domain = $1"
                        ))
                        .bind(domain)
                        .fetch_optional(executor)
                        .await
                    }
                    None => {
                        sqlx::query_as::<_, Nominee>(&format!(
                            r#"SELECT {NOMINEE_COLUMNS} FROM nominees
                            WHERE nominee_type = 'company' AND company_domain IS NULL
                              AND LOWER(company_name) = $1
                            LIMIT 1"#
                        ))
                        .bind(c.name.trim().to_lowercase())
                        .fetch_optional(executor)
                        .await
                    }
                }
            }
        }
    }

    /// Pick a free slug for `name`: `jane-doe`, then `jane-doe-2`, `jane-doe-3`...
    pub async fn unique_slug(conn: &mut SqliteConnection, name: &str) -> Result<String, sqlx::Error> {
        let mut base = slugify(name);
        if base.is_empty() {
            base = "nominee".to_string();
        }

        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT live_url FROM nominees WHERE live_url = $1 OR live_url LIKE $1 || '-%'",
        )
        .bind(&base)
        .fetch_all(&mut *conn)
        .await?;

        if !taken.contains(&base) {
            return Ok(base);
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    pub async fn create(conn: &mut SqliteConnection, data: &CreateNominee) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let live_url = Self::unique_slug(conn, &data.display_name()).await?;

        let query = format!(
            r#"INSERT INTO nominees (
                id, nominee_type, firstname, lastname, person_email, person_linkedin, job_title,
                person_company, person_country, headshot_url, why_me, company_name,
                company_website, company_domain, company_linkedin, company_country, company_size,
                company_industry, logo_url, why_us, live_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21)
            RETURNING {NOMINEE_COLUMNS}"#
        );

        let none = None::<String>;
        let insert = sqlx::query_as::<_, Nominee>(&query)
            .bind(id)
            .bind(data.nominee_type());

        let insert = match data {
            CreateNominee::Person(p) => insert
                .bind(p.firstname.trim().to_string())
                .bind(p.lastname.trim().to_string())
                .bind(normalize_email(&p.email))
                .bind(p.linkedin.clone())
                .bind(p.job_title.clone())
                .bind(p.company.clone())
                .bind(p.country.clone())
                .bind(p.headshot_url.clone())
                .bind(p.why_me.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone()),
            CreateNominee::Company(c) => insert
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(none.clone())
                .bind(Some(c.name.trim().to_string()))
                .bind(Some(c.website.trim().to_string()))
                .bind(website_host(&c.website))
                .bind(c.linkedin.clone())
                .bind(c.country.clone())
                .bind(c.size.clone())
                .bind(c.industry.clone())
                .bind(c.logo_url.clone())
                .bind(c.why_us.clone()),
        };

        insert.bind(live_url).fetch_one(&mut *conn).await
    }

    pub async fn update_profile<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateNominee,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Nominee>(&format!(
            r#"UPDATE nominees SET
                firstname      = COALESCE($2, firstname),
                lastname       = COALESCE($3, lastname),
                job_title      = COALESCE($4, job_title),
                person_company = COALESCE($5, person_company),
                headshot_url   = COALESCE($6, headshot_url),
                why_me         = COALESCE($7, why_me),
                company_name   = COALESCE($8, company_name),
                logo_url       = COALESCE($9, logo_url),
                why_us         = COALESCE($10, why_us),
                bio            = COALESCE($11, bio),
                achievements   = COALESCE($12, achievements),
                live_url       = COALESCE($13, live_url),
                updated_at     = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {NOMINEE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.firstname)
        .bind(&data.lastname)
        .bind(&data.job_title)
        .bind(&data.person_company)
        .bind(&data.headshot_url)
        .bind(&data.why_me)
        .bind(&data.company_name)
        .bind(&data.logo_url)
        .bind(&data.why_us)
        .bind(&data.bio)
        .bind(&data.achievements)
        .bind(data.live_url.as_deref().map(slugify))
        .fetch_optional(executor)
        .await
    }
}
