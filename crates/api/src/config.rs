//! Application configuration loaded from environment variables.

use std::str::FromStr;

use store::PgConnectOptions;
use thiserror::Error;

/// A variable was set to a value that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Connection settings for PostgreSQL.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub options: PgConnectOptions,
    pub max_connections: u32,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: full PostgreSQL URL; when absent the connection is
///   built from `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT`, and
///   `DB_DATABASE` as long as `DB_HOST` is set
/// - `DB_MAX_CONNECTIONS`: pool size (default: `10`)
///
/// Without any database settings the server runs on the in-memory store.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(value) => parse(&value, "PORT")?,
            None => defaults.port,
        };
        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" | "" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError {
                        key: "LOG_FORMAT",
                        value,
                    });
                }
            },
            None => defaults.log_format,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database: database_from(&lookup)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database: None,
        }
    }
}

fn database_from<F>(lookup: &F) -> Result<Option<DatabaseConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let options = match lookup("DATABASE_URL") {
        // The URL may carry a password, so it is left out of the error.
        Some(url) => PgConnectOptions::from_str(&url).map_err(|_| ConfigError {
            key: "DATABASE_URL",
            value: "<redacted>".to_string(),
        })?,
        None => match lookup("DB_HOST") {
            Some(host) => connect_options_from_parts(lookup, &host)?,
            None => return Ok(None),
        },
    };
    let max_connections = match lookup("DB_MAX_CONNECTIONS") {
        Some(value) => parse(&value, "DB_MAX_CONNECTIONS")?,
        None => 10,
    };

    Ok(Some(DatabaseConfig {
        options,
        max_connections,
    }))
}

/// Each part is set verbatim, so credentials need no escaping.
fn connect_options_from_parts<F>(lookup: &F, host: &str) -> Result<PgConnectOptions, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match lookup("DB_PORT") {
        Some(value) => parse(&value, "DB_PORT")?,
        None => 5432,
    };
    let username = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let database = lookup("DB_DATABASE").unwrap_or_else(|| "postgres".to_string());

    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(&username)
        .database(&database);
    Ok(match lookup("DB_PASSWORD") {
        Some(password) => options.password(&password),
        None => options,
    })
}

fn parse<T: std::str::FromStr>(value: &str, key: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key,
        value: value.to_string(),
    })
}
