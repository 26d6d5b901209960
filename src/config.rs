//! Service configuration
//!
//! Every value can come from a flag or from the environment (a `.env` file is
//! loaded first by the binary). Components receive what they need through
//! their constructors; nothing here is global.

use crate::auth::password::{MAX_COST, MIN_COST};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const SECS_PER_HOUR: u64 = 3600;

#[derive(Parser, Debug, Clone)]
#[command(name = "taskgate")]
#[command(about = "Taskgate - token-authenticated task service")]
pub struct Config {
    /// HMAC secret for access tokens
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_token_secret: String,

    /// HMAC secret for refresh tokens (must differ from the access secret)
    #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true)]
    pub refresh_token_secret: String,

    /// Access token lifetime in hours
    #[arg(long, env = "ACCESS_TOKEN_EXPIRY_HOUR", default_value = "2")]
    pub access_token_expiry_hour: u64,

    /// Refresh token lifetime in hours
    #[arg(long, env = "REFRESH_TOKEN_EXPIRY_HOUR", default_value = "168")]
    pub refresh_token_expiry_hour: u64,

    /// Per-operation timeout in seconds
    #[arg(long, env = "CONTEXT_TIMEOUT", default_value = "2")]
    pub context_timeout: u64,

    /// Address the HTTP server binds to
    #[arg(long, env = "SERVER_ADDRESS", default_value = "0.0.0.0:8080")]
    pub server_address: String,

    /// SQLite database file
    #[arg(long, env = "AUTH_DB_PATH", default_value = "taskgate.db")]
    pub auth_db_path: String,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptySecret(&'static str),

    #[error("access and refresh token secrets must differ")]
    SharedSecret,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} is too large")]
    TooLarge(&'static str),

    #[error("bcrypt cost {0} is outside {MIN_COST}..={MAX_COST}")]
    BcryptCost(u32),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.is_empty() {
            return Err(ConfigError::EmptySecret("ACCESS_TOKEN_SECRET"));
        }
        if self.refresh_token_secret.is_empty() {
            return Err(ConfigError::EmptySecret("REFRESH_TOKEN_SECRET"));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::SharedSecret);
        }
        if self.access_token_expiry_hour == 0 {
            return Err(ConfigError::Zero("ACCESS_TOKEN_EXPIRY_HOUR"));
        }
        if self.refresh_token_expiry_hour == 0 {
            return Err(ConfigError::Zero("REFRESH_TOKEN_EXPIRY_HOUR"));
        }
        if self.access_token_expiry_hour.checked_mul(SECS_PER_HOUR).is_none() {
            return Err(ConfigError::TooLarge("ACCESS_TOKEN_EXPIRY_HOUR"));
        }
        if self.refresh_token_expiry_hour.checked_mul(SECS_PER_HOUR).is_none() {
            return Err(ConfigError::TooLarge("REFRESH_TOKEN_EXPIRY_HOUR"));
        }
        if self.context_timeout == 0 {
            return Err(ConfigError::Zero("CONTEXT_TIMEOUT"));
        }
        if !(MIN_COST..=MAX_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::BcryptCost(self.bcrypt_cost));
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expiry_hour.saturating_mul(SECS_PER_HOUR))
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiry_hour.saturating_mul(SECS_PER_HOUR))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout)
    }
}

/// Resolve a database path; relative paths are taken from the working directory.
pub fn resolve_data_path(raw: &str) -> anyhow::Result<PathBuf> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec![
            "taskgate",
            "--access-token-secret",
            "access",
            "--refresh-token-secret",
            "refresh",
        ];
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.access_token_ttl(), Duration::from_secs(2 * 3600));
        assert_eq!(config.refresh_token_ttl(), Duration::from_secs(168 * 3600));
        assert_eq!(config.operation_timeout(), Duration::from_secs(2));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn test_rejects_shared_secret() {
        let config = Config::try_parse_from([
            "taskgate",
            "--access-token-secret",
            "same",
            "--refresh-token-secret",
            "same",
        ])
        .unwrap();
        assert_eq!(config.validate(), Err(ConfigError::SharedSecret));
    }

    #[test]
    fn test_rejects_zero_values_and_bad_cost() {
        assert_eq!(
            parse(&["--context-timeout", "0"]).validate(),
            Err(ConfigError::Zero("CONTEXT_TIMEOUT"))
        );
        assert_eq!(
            parse(&["--access-token-expiry-hour", "0"]).validate(),
            Err(ConfigError::Zero("ACCESS_TOKEN_EXPIRY_HOUR"))
        );
        assert_eq!(
            parse(&["--bcrypt-cost", "2"]).validate(),
            Err(ConfigError::BcryptCost(2))
        );
    }

    #[test]
    fn test_rejects_overflowing_expiry() {
        let huge = u64::MAX.to_string();
        let config = parse(&["--refresh-token-expiry-hour", &huge]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge("REFRESH_TOKEN_EXPIRY_HOUR"))
        );
        assert_eq!(config.refresh_token_ttl(), Duration::from_secs(u64::MAX));

        let config = parse(&["--access-token-expiry-hour", &huge]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge("ACCESS_TOKEN_EXPIRY_HOUR"))
        );
    }

    #[test]
    fn test_relative_data_path_uses_working_directory() {
        let resolved = resolve_data_path("taskgate.db").unwrap();
        assert_eq!(
            resolved,
            std::env::current_dir().unwrap().join("taskgate.db")
        );
        assert_eq!(
            resolve_data_path("/var/lib/taskgate.db").unwrap(),
            PathBuf::from("/var/lib/taskgate.db")
        );
    }
}
