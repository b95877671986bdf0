use std::{env, fmt::Display, path::Path, str::FromStr};

use thiserror::Error;

use crate::constants::DEFAULT_PAGE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub secret: String,
    pub token_hours: i64,
    pub page_size: i64,
    pub max_connections: u32,
}

/// Copies an env file into the process environment without overriding
/// variables that are already set. Runs before the logger reads `RUST_LOG`.
pub fn load_env_file(path: impl AsRef<Path>) -> bool {
    dotenv::from_path(path).is_ok()
}

impl Config {
    /// Reads the process environment. See [`load_env_file`] for `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: try_load("FOODGRAM_PORT", "8000")?,
            secret: require("FOODGRAM_SECRET")?,
            token_hours: try_load("FOODGRAM_TOKEN_HOURS", "24")?,
            page_size: try_load("FOODGRAM_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
            max_connections: try_load("FOODGRAM_MAX_CONNECTIONS", "5")?,
        })
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 8000,
            secret: String::from("foodgram-development-secret"),
            token_hours: 24,
            page_size: DEFAULT_PAGE_SIZE,
            max_connections: 5,
        }
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| {
        log::warn!("Environment variable {key} not found");
        ConfigError::Missing(key)
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            log::warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_use_defaults() {
        let port: u16 = try_load("FOODGRAM_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);
    }

    #[test]
    fn env_file_fills_the_environment() {
        let path = env::temp_dir().join(format!("foodgram-{}.env", std::process::id()));
        std::fs::write(&path, "FOODGRAM_TEST_FILE_LEVEL=debug\n").unwrap();

        assert!(load_env_file(&path));
        assert_eq!(env::var("FOODGRAM_TEST_FILE_LEVEL").as_deref(), Ok("debug"));

        std::fs::remove_file(&path).unwrap();
        assert!(!load_env_file(&path));
    }

    #[test]
    fn unparsable_values_are_errors() {
        env::set_var("FOODGRAM_TEST_BAD_PAGE_SIZE", "ten");
        let result: Result<i64, _> = try_load("FOODGRAM_TEST_BAD_PAGE_SIZE", "10");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "FOODGRAM_TEST_BAD_PAGE_SIZE", .. })
        ));
    }
}
