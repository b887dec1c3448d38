use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::dag::RetryPolicy;
use crate::dates::{DEFAULT_TIMEZONE, season_for_date};
use crate::http_client::DEFAULT_TIMEOUT_SECS;
use crate::loader::{DEFAULT_MAX_ROWS, DEFAULT_SCHEMA};
use crate::nba_stats::{DEFAULT_BASE_URL, ProviderConfig};

const DEFAULT_TEAM_DELAY_MS: u64 = 2000;
const DEFAULT_PLAYER_DELAY_MS: u64 = 1000;
const DEFAULT_PG_PORT: u16 = 5432;

/// Postgres connection parameters.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub schema: String,
    pub timezone: Tz,
    /// Fixed season label; derived from the target date when unset.
    pub season: Option<String>,
    pub team_delay: Duration,
    pub player_delay: Duration,
    pub max_rows: usize,
    pub provider: ProviderConfig,
    pub retry: RetryPolicy,
    db_host: Option<String>,
    db_port: u16,
    db_user: Option<String>,
    db_password: Option<String>,
    db_name: Option<String>,
}

impl PipelineConfig {
    /// Reads `.env` (when present) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timezone = match get("NBA_TIMEZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|e| anyhow!("invalid NBA_TIMEZONE {raw:?}: {e}"))?,
            None => DEFAULT_TIMEZONE,
        };
        let max_rows = parse_or(&get, "NBA_LOAD_MAX_ROWS", DEFAULT_MAX_ROWS)?;
        if max_rows == 0 {
            return Err(anyhow!("NBA_LOAD_MAX_ROWS must be at least 1"));
        }

        Ok(Self {
            schema: get("NBA_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            timezone,
            season: get("NBA_SEASON"),
            team_delay: Duration::from_millis(parse_or(
                &get,
                "NBA_TEAM_DELAY_MS",
                DEFAULT_TEAM_DELAY_MS,
            )?),
            player_delay: Duration::from_millis(parse_or(
                &get,
                "NBA_PLAYER_DELAY_MS",
                DEFAULT_PLAYER_DELAY_MS,
            )?),
            max_rows,
            provider: ProviderConfig {
                base_url: get("NBA_STATS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_secs(parse_or(
                    &get,
                    "NBA_HTTP_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?),
            },
            retry: RetryPolicy {
                retries: parse_or(&get, "NBA_TASK_RETRIES", RetryPolicy::default().retries)?,
                delay: Duration::from_secs(parse_or(
                    &get,
                    "NBA_RETRY_DELAY_SECS",
                    RetryPolicy::default().delay.as_secs(),
                )?),
            },
            db_host: get("HOST_POSTGRES"),
            db_port: parse_or(&get, "PORT_POSTGRES", DEFAULT_PG_PORT)?,
            db_user: get("USER_POSTGRES"),
            db_password: get("PASSWORD_POSTGRES"),
            db_name: get("DATABASE_POSTGRES"),
        })
    }

    pub fn season_for(&self, target: NaiveDate) -> String {
        self.season
            .clone()
            .unwrap_or_else(|| season_for_date(target))
    }

    /// Postgres settings; only required when loading into Postgres.
    pub fn database(&self) -> Result<DatabaseConfig> {
        let require = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| anyhow!("{key} is not set"))
        };
        Ok(DatabaseConfig {
            host: require(&self.db_host, "HOST_POSTGRES")?,
            port: self.db_port,
            user: require(&self.db_user, "USER_POSTGRES")?,
            password: require(&self.db_password, "PASSWORD_POSTGRES")?,
            database: require(&self.db_name, "DATABASE_POSTGRES")?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key} {raw:?}: {e}")),
        None => Ok(default),
    }
}
