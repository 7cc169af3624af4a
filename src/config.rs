use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub sync: SyncConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional origin allowed by CORS. Read from env var `CORS_ALLOWED_ORIGIN`.
    /// When unset, no CORS layer is installed.
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Sqlite,
    Csv,
}

impl FromStr for LedgerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(LedgerBackend::Sqlite),
            "csv" => Ok(LedgerBackend::Csv),
            _ => Err(ConfigError::InvalidValue("LEDGER_BACKEND".to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Path of the CSV ledger file (only used with the `csv` backend).
    pub csv_path: String,
    /// IANA timezone used to render check-in/check-out dates and timestamps.
    pub timezone: String,
    /// Language of header labels and status labels (`en`, `zh`).
    pub language: String,
}

impl LedgerConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidValue("LEDGER_TIMEZONE".to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Whether the periodic sync worker runs.
    pub worker_enabled: bool,
    /// Seconds between two worker runs.
    pub interval_seconds: u64,
    /// Rows whose last update is older than this are refreshed even without changes.
    pub staleness_seconds: i64,
    /// Literal value of the feed `enabled` column that marks a feed as active.
    /// Compared by exact string equality.
    pub enabled_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    /// Maximum number of feeds fetched and parsed at the same time.
    pub max_concurrent: usize,
    /// Attempts per feed, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_seconds: u64,
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            ledger: LedgerConfig {
                backend: env::var("LEDGER_BACKEND")
                    .unwrap_or_else(|_| "sqlite".to_string())
                    .parse()?,
                csv_path: env::var("LEDGER_CSV_PATH")
                    .unwrap_or_else(|_| "data/bookings.csv".to_string()),
                timezone: env::var("LEDGER_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
                language: env::var("LEDGER_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            },
            sync: SyncConfig {
                worker_enabled: env_bool("SYNC_WORKER_ENABLED", true),
                interval_seconds: env::var("SYNC_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("SYNC_INTERVAL_SECONDS".to_string()))?,
                staleness_seconds: env::var("SYNC_STALENESS_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("SYNC_STALENESS_SECONDS".to_string())
                    })?,
                enabled_marker: env::var("FEED_ENABLED_MARKER")
                    .unwrap_or_else(|_| "enabled".to_string()),
            },
            fetch: FetchConfig {
                timeout_seconds: env::var("FEED_FETCH_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
                max_concurrent: env::var("FEED_MAX_CONCURRENT_FETCHES")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .unwrap_or(4usize)
                    .max(1),
                max_attempts: env::var("FEED_FETCH_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3u32)
                    .max(1),
                initial_backoff_ms: env::var("FEED_FETCH_INITIAL_BACKOFF_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000u64),
                max_backoff_seconds: env::var("FEED_FETCH_MAX_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
            },
        };

        config.ledger.tz()?;
        if !crate::i18n::is_supported_language(&crate::i18n::normalize_language(
            &config.ledger.language,
        )) {
            return Err(ConfigError::InvalidValue("LEDGER_LANGUAGE".to_string()));
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_allowed_origin: None,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            ledger: LedgerConfig {
                backend: LedgerBackend::Sqlite,
                csv_path: "data/bookings.csv".to_string(),
                timezone: "UTC".to_string(),
                language: "en".to_string(),
            },
            sync: SyncConfig {
                worker_enabled: true,
                interval_seconds: 3600,
                staleness_seconds: 3600,
                enabled_marker: "enabled".to_string(),
            },
            fetch: FetchConfig {
                timeout_seconds: 30,
                max_concurrent: 4,
                max_attempts: 3,
                initial_backoff_ms: 1000,
                max_backoff_seconds: 30,
            },
        }
    }
}
