use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// Absent means the in-memory store (development only).
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    // Attendance rules
    pub utc_offset_minutes: i32,
    pub sweep_interval_secs: u64,
    pub stale_after_hours: i64,
    pub correction_window_hours: i64,
    pub store_timeout_secs: u64,

    pub log_dir: String,
}

/// One year. Keeps every derived instant well inside chrono's range.
const MAX_WINDOW_HOURS: i64 = 24 * 366;
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_STORE_TIMEOUT_SECS: u64 = 300;

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8010".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            utc_offset_minutes: var_or("UTC_OFFSET_MINUTES", 0)?,
            sweep_interval_secs: var_or("SWEEP_INTERVAL_SECS", 60)?,
            stale_after_hours: var_or("STALE_AFTER_HOURS", 12)?,
            correction_window_hours: var_or("CORRECTION_WINDOW_HOURS", 48)?,
            store_timeout_secs: var_or("STORE_TIMEOUT_SECS", 5)?,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=MAX_SWEEP_INTERVAL_SECS).contains(&self.sweep_interval_secs),
            "SWEEP_INTERVAL_SECS must be between 1 and {MAX_SWEEP_INTERVAL_SECS}"
        );
        anyhow::ensure!(
            (1..=MAX_WINDOW_HOURS).contains(&self.stale_after_hours),
            "STALE_AFTER_HOURS must be between 1 and {MAX_WINDOW_HOURS}"
        );
        anyhow::ensure!(
            (1..=MAX_WINDOW_HOURS).contains(&self.correction_window_hours),
            "CORRECTION_WINDOW_HOURS must be between 1 and {MAX_WINDOW_HOURS}"
        );
        anyhow::ensure!(
            (1..=MAX_STORE_TIMEOUT_SECS).contains(&self.store_timeout_secs),
            "STORE_TIMEOUT_SECS must be between 1 and {MAX_STORE_TIMEOUT_SECS}"
        );
        self.utc_offset()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("UTC_OFFSET_MINUTES out of range: {}", self.utc_offset_minutes))
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".into(),
            database_url: None,
            jwt_secret: jwt_secret.into(),
            api_prefix: "/api".into(),
            rate_protected_per_min: 1000,
            utc_offset_minutes: 0,
            sweep_interval_secs: 60,
            stale_after_hours: 12,
            correction_window_hours: 48,
            store_timeout_secs: 5,
            log_dir: "logs".into(),
        }
    }
}
