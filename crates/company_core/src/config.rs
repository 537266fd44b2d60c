//! Runtime configuration loaded from the environment.
//!
//! # Responsibility
//! - Read database, journal and logging settings from `app.env` / `.env`
//!   files and process environment (environment wins).
//! - Reject incomplete database configuration at startup.
//!
//! # Invariants
//! - All `DB_*` pool settings are required; missing keys are reported together.
//! - Secrets are never logged; only pool sizing and policies are.

use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const REQUIRED_KEYS: [&str; 5] = [
    "DB_CONN_STRING",
    "DB_MAX_OPEN_CONNS",
    "DB_MAX_IDLE_CONNS",
    "DB_CONN_MAX_LIFETIME",
    "DB_CONN_MAX_IDLE_TIME",
];
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(Vec<&'static str>),
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(keys) => write!(
                f,
                "missing required configuration variables: {}",
                keys.join(", ")
            ),
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// What happens when the event journal fails inside a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalPolicy {
    /// Log the failure and commit the primary write anyway.
    #[default]
    BestEffort,
    /// Abort the mutation and roll back the primary write.
    Required,
}

impl JournalPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::Required => "required",
        }
    }
}

/// Connection string and pool sizing for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// SQLite file path or `file:` URI.
    pub conn_string: String,
    pub max_open_conns: u32,
    /// Idle connections kept warm; never above `max_open_conns`.
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// Pool settings suitable for a local file database.
    pub fn for_path(conn_string: impl Into<String>) -> Self {
        Self {
            conn_string: conn_string.into(),
            max_open_conns: 8,
            max_idle_conns: 2,
            conn_max_lifetime: Duration::from_secs(30 * 60),
            conn_max_idle_time: Duration::from_secs(5 * 60),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Rolling log directory. `None` logs to stderr.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db: DbConfig,
    pub journal_policy: JournalPolicy,
    pub log: LogConfig,
}

impl AppConfig {
    /// Loads configuration from env files and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::from_filename("app.env").ok();
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .into_iter()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &'static str| get(key).unwrap_or_default();

        let max_open_conns = parse_u32("DB_MAX_OPEN_CONNS", &required("DB_MAX_OPEN_CONNS"))?;
        if max_open_conns == 0 {
            return Err(invalid("DB_MAX_OPEN_CONNS", "0", "must be at least 1"));
        }
        let max_idle_conns = parse_u32("DB_MAX_IDLE_CONNS", &required("DB_MAX_IDLE_CONNS"))?;
        if max_idle_conns > max_open_conns {
            return Err(invalid(
                "DB_MAX_IDLE_CONNS",
                &max_idle_conns.to_string(),
                "must not exceed DB_MAX_OPEN_CONNS",
            ));
        }

        let busy_timeout = match get("DB_BUSY_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(parse_u64("DB_BUSY_TIMEOUT_MS", &value)?),
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };

        let db = DbConfig {
            conn_string: required("DB_CONN_STRING"),
            max_open_conns,
            max_idle_conns,
            conn_max_lifetime: parse_duration(
                "DB_CONN_MAX_LIFETIME",
                &required("DB_CONN_MAX_LIFETIME"),
            )?,
            conn_max_idle_time: parse_duration(
                "DB_CONN_MAX_IDLE_TIME",
                &required("DB_CONN_MAX_IDLE_TIME"),
            )?,
            busy_timeout,
        };

        let journal_policy = match get("COMPANY_JOURNAL_POLICY").as_deref() {
            None | Some("best_effort") => JournalPolicy::BestEffort,
            Some("required") => JournalPolicy::Required,
            Some(other) => {
                return Err(invalid(
                    "COMPANY_JOURNAL_POLICY",
                    other,
                    "expected best_effort|required",
                ))
            }
        };

        let log = LogConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| crate::default_log_level().to_string()),
            dir: get("LOG_DIR"),
        };

        Ok(Self {
            db,
            journal_policy,
            log,
        })
    }

    /// Logs the non-sensitive parts of the configuration.
    pub fn log_summary(&self) {
        info!(
            "event=config_loaded module=config status=ok db_max_open_conns={} db_max_idle_conns={} db_conn_max_lifetime_s={} db_conn_max_idle_time_s={} db_busy_timeout_ms={} journal_policy={}",
            self.db.max_open_conns,
            self.db.max_idle_conns,
            self.db.conn_max_lifetime.as_secs(),
            self.db.conn_max_idle_time.as_secs(),
            self.db.busy_timeout.as_millis(),
            self.journal_policy.as_str()
        );
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_u32(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|err| invalid(key, value, &err.to_string()))
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|err| invalid(key, value, &err.to_string()))
}

/// Parses `300`, `300s`, `5m` or `1h`. Bare numbers are seconds.
fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 60 * 60),
        _ => (value, 1),
    };
    let amount = digits
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(key, value, "expected seconds or a duration like 30s|5m|1h"))?;
    Ok(Duration::from_secs(amount * multiplier))
}
