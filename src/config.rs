//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::ledger::words::AmountWordsMode;
use crate::ledger::{BatchCurrencyPolicy, LedgerSettings};
use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Whether one payment batch may mix currencies
    pub batch_currency_policy: BatchCurrencyPolicy,
    /// How fractional totals are written out in words
    pub amount_words_mode: AmountWordsMode,
    /// Where the console goes after the last workflow step
    pub detail_route_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // DATABASE_URL, or the individual DATABASE_* components
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                let host = env::var("DATABASE_HOST")?;
                let port = env::var("DATABASE_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_USER")?;
                let password = env::var("DATABASE_PASSWORD")?;
                let db = env::var("DATABASE_DB")?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url,
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB default
            cors_origins: parse_origins(env::var("CORS_ORIGINS").ok().as_deref()),
            environment,
            batch_currency_policy: parse_setting(
                "BATCH_CURRENCY_POLICY",
                env::var("BATCH_CURRENCY_POLICY").ok().as_deref(),
            )?,
            amount_words_mode: parse_setting(
                "AMOUNT_WORDS_MODE",
                env::var("AMOUNT_WORDS_MODE").ok().as_deref(),
            )?,
            detail_route_prefix: normalize_route_prefix(
                &env::var("DETAIL_ROUTE_PREFIX").unwrap_or_else(|_| "/admin/applicant".to_string()),
            ),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            currency_policy: self.batch_currency_policy,
            words_mode: self.amount_words_mode,
        }
    }
}

fn parse_origins(value: Option<&str>) -> Vec<String> {
    match value {
        Some(s) => s
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
        None => vec!["http://localhost:8080".to_string()],
    }
}

/// Unset or blank falls back to the default; anything else must parse
fn parse_setting<T>(name: &str, value: Option<&str>) -> Result<T, ConfigError>
where
    T: FromStr<Err = String> + Default,
{
    match value.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(v) => v
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e))),
    }
}

fn normalize_route_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
