//! Runtime configuration read from the process environment.

use std::{net::IpAddr, path::PathBuf, time::Duration};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

pub const DEFAULT_HUBSPOT_BASE_URL: &str = "https://api.hubapi.com";
pub const DEFAULT_LOOPS_BASE_URL: &str = "https://app.loops.so/api/v1";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Credentials and endpoint for one external contact platform.
#[derive(Debug, Clone)]
pub struct ApiTargetConfig {
    pub base_url: String,
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i64,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Rows stuck in `processing` longer than this go back to `pending`
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 25,
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60 * 60),
            stale_after: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    /// Origin of the public site, used to build nominee live URLs
    pub public_base_url: String,
    /// Admin API bearer token. `None` disables the admin API.
    pub admin_token: Option<SecretString>,
    pub hubspot: Option<ApiTargetConfig>,
    pub loops: Option<ApiTargetConfig>,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; malformed values are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = parse_var::<IpAddr>("HOST", "an IP address")?
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));
        let port = parse_var::<u16>("PORT", "a port number")?.unwrap_or(3001);

        let public_base_url = match non_empty_var("WSA_PUBLIC_BASE_URL") {
            Some(value) => {
                let parsed = Url::parse(&value).map_err(|_| ConfigError::Invalid {
                    var: "WSA_PUBLIC_BASE_URL",
                    expected: "an absolute URL",
                    value: value.clone(),
                })?;
                parsed.as_str().trim_end_matches('/').to_string()
            }
            None => DEFAULT_PUBLIC_BASE_URL.to_string(),
        };

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            poll_interval: Duration::from_secs(
                parse_var::<u64>("WSA_SYNC_INTERVAL_SECS", "a positive integer")?
                    .filter(|&s| s > 0)
                    .unwrap_or(defaults.poll_interval.as_secs()),
            ),
            batch_size: parse_var::<i64>("WSA_SYNC_BATCH_SIZE", "a positive integer")?
                .filter(|&n| n > 0)
                .unwrap_or(defaults.batch_size),
            max_attempts: parse_var::<i64>("WSA_SYNC_MAX_ATTEMPTS", "a positive integer")?
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_attempts),
            ..defaults
        };

        Ok(Self {
            host,
            port,
            database_path: utils::assets::database_path(),
            public_base_url,
            admin_token: non_empty_var("ADMIN_TOKEN").map(SecretString::from),
            hubspot: api_target("HUBSPOT_TOKEN", "HUBSPOT_BASE_URL", DEFAULT_HUBSPOT_BASE_URL),
            loops: api_target("LOOPS_API_KEY", "LOOPS_BASE_URL", DEFAULT_LOOPS_BASE_URL),
            sync,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match non_empty_var(var) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value,
            }),
        None => Ok(None),
    }
}

fn api_target(token_var: &str, url_var: &str, default_url: &str) -> Option<ApiTargetConfig> {
    let token = non_empty_var(token_var)?;
    let base_url = non_empty_var(url_var)
        .unwrap_or_else(|| default_url.to_string())
        .trim_end_matches('/')
        .to_string();
    Some(ApiTargetConfig {
        base_url,
        token: SecretString::from(token),
    })
}
