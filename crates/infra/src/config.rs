//! Runtime configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `DATABASE_URL` - `PostgreSQL` connection string; absent means the in-memory store
//! - `PHARMATRACK_HOST` - Bind address (default: 0.0.0.0)
//! - `PHARMATRACK_PORT` - Listen port (default: 8080)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `EXPIRY_RISK_DAYS` - Default expiry-risk window in days (default: 30)
//! - `SALE_MAX_RETRIES` - Attempts for a sale that hits concurrent modification (default: 3)
//! - `FORECAST_HORIZON_MONTHS` - Default forecast horizon (default: 3)
//! - `LOG_FORMAT` - `json` or `text` (default: json)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use pharmatrack_observability::LogFormat;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub database_max_connections: u32,
    pub expiry_risk_days: i64,
    pub sale_max_retries: u32,
    pub forecast_horizon_months: u32,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            database_max_connections: 5,
            expiry_risk_days: 30,
            sale_max_retries: 3,
            forecast_horizon_months: 3,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv()` first so a `.env` file, if present, is honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sale_max_retries = parse_or(&get, "SALE_MAX_RETRIES", defaults.sale_max_retries)?;
        if sale_max_retries == 0 {
            return Err(invalid("SALE_MAX_RETRIES", "must be at least 1"));
        }
        let forecast_horizon_months =
            parse_or(&get, "FORECAST_HORIZON_MONTHS", defaults.forecast_horizon_months)?;
        if !(1..=pharmatrack_ai::MAX_MONTHS_AHEAD).contains(&forecast_horizon_months) {
            return Err(invalid(
                "FORECAST_HORIZON_MONTHS",
                format!("must be within 1..={}", pharmatrack_ai::MAX_MONTHS_AHEAD),
            ));
        }
        let expiry_risk_days = parse_or(&get, "EXPIRY_RISK_DAYS", defaults.expiry_risk_days)?;
        if expiry_risk_days < 0 {
            return Err(invalid("EXPIRY_RISK_DAYS", "must not be negative"));
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            host: parse_or(&get, "PHARMATRACK_HOST", defaults.host)?,
            port: parse_or(&get, "PHARMATRACK_PORT", defaults.port)?,
            database_max_connections: parse_or(
                &get,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            expiry_risk_days,
            sale_max_retries,
            forecast_horizon_months,
            log_format: parse_or(&get, "LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.into())
}
