use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use ts_rs::TS;

/// Raw key-value row from `app_settings`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AppSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Keys the application understands. Anything else is rejected on write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettingKey {
    NominationsOpen,
    VotingOpen,
    VotingStartDate,
    NominationsCloseDate,
    CampaignYear,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingValueError {
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("`{key}` expects true or false, got `{value}`")]
    NotABool { key: String, value: String },
    #[error("`{key}` expects an RFC 3339 timestamp or an empty value, got `{value}`")]
    NotATimestamp { key: String, value: String },
    #[error("`campaign_year` expects a four digit year, got `{0}`")]
    NotAYear(String),
}

impl SettingKey {
    /// Check `value` is acceptable for this key and return its canonical form.
    pub fn normalize(self, value: &str) -> Result<String, SettingValueError> {
        let value = value.trim();
        match self {
            SettingKey::NominationsOpen | SettingKey::VotingOpen => parse_bool(value)
                .map(|b| b.to_string())
                .ok_or_else(|| SettingValueError::NotABool {
                    key: self.to_string(),
                    value: value.to_string(),
                }),
            SettingKey::VotingStartDate | SettingKey::NominationsCloseDate => {
                if value.is_empty() {
                    return Ok(String::new());
                }
                DateTime::parse_from_rfc3339(value)
                    .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
                    .map_err(|_| SettingValueError::NotATimestamp {
                        key: self.to_string(),
                        value: value.to_string(),
                    })
            }
            SettingKey::CampaignYear => {
                if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
                    Ok(value.to_string())
                } else {
                    Err(SettingValueError::NotAYear(value.to_string()))
                }
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Typed view over the settings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CampaignSettings {
    pub nominations_open: bool,
    pub voting_open: bool,
    pub voting_start_date: Option<DateTime<Utc>>,
    pub nominations_close_date: Option<DateTime<Utc>>,
    pub campaign_year: String,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            nominations_open: true,
            voting_open: false,
            voting_start_date: None,
            nominations_close_date: None,
            campaign_year: "2026".to_string(),
        }
    }
}

/// What the public site needs to decide which forms to show.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CampaignStatus {
    pub accepting_nominations: bool,
    pub accepting_votes: bool,
    pub voting_start_date: Option<DateTime<Utc>>,
    pub nominations_close_date: Option<DateTime<Utc>>,
    pub campaign_year: String,
}

impl CampaignSettings {
    /// Build from raw rows; malformed or missing values fall back to defaults.
    pub fn from_rows(rows: &[AppSetting]) -> Self {
        let mut settings = Self::default();
        for row in rows {
            let Ok(key) = row.key.parse::<SettingKey>() else {
                continue;
            };
            match key {
                SettingKey::NominationsOpen => {
                    if let Some(b) = parse_bool(&row.value) {
                        settings.nominations_open = b;
                    }
                }
                SettingKey::VotingOpen => {
                    if let Some(b) = parse_bool(&row.value) {
                        settings.voting_open = b;
                    }
                }
                SettingKey::VotingStartDate => settings.voting_start_date = parse_timestamp(&row.value),
                SettingKey::NominationsCloseDate => {
                    settings.nominations_close_date = parse_timestamp(&row.value)
                }
                SettingKey::CampaignYear => {
                    if !row.value.trim().is_empty() {
                        settings.campaign_year = row.value.trim().to_string();
                    }
                }
            }
        }
        settings
    }

    pub fn accepting_nominations(&self, now: DateTime<Utc>) -> bool {
        self.nominations_open && self.nominations_close_date.is_none_or(|close| now < close)
    }

    pub fn accepting_votes(&self, now: DateTime<Utc>) -> bool {
        self.voting_open && self.voting_start_date.is_none_or(|start| now >= start)
    }

    pub fn status(&self, now: DateTime<Utc>) -> CampaignStatus {
        CampaignStatus {
            accepting_nominations: self.accepting_nominations(now),
            accepting_votes: self.accepting_votes(now),
            voting_start_date: self.voting_start_date,
            nominations_close_date: self.nominations_close_date,
            campaign_year: self.campaign_year.clone(),
        }
    }

    pub async fn load<'e, E>(executor: E) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = AppSetting::get_all(executor).await?;
        Ok(Self::from_rows(&rows))
    }
}

impl AppSetting {
    pub async fn get_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, AppSetting>("SELECT key, value, updated_at FROM app_settings ORDER BY key")
            .fetch_all(executor)
            .await
    }

    pub async fn get<'e, E>(executor: E, key: SettingKey) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, AppSetting>(
            "SELECT key, value, updated_at FROM app_settings WHERE key = $1",
        )
        .bind(key.as_ref())
        .fetch_optional(executor)
        .await
    }

    /// Store an already-normalized value.
    pub async fn set<'e, E>(executor: E, key: SettingKey, value: &str) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, AppSetting>(
            r#"INSERT INTO app_settings (key, value) VALUES ($1, $2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now', 'subsec')
            RETURNING key, value, updated_at"#,
        )
        .bind(key.as_ref())
        .bind(value)
        .fetch_one(executor)
        .await
    }
}
