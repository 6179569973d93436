use crate::domain::{Address, DEFAULT_CONTRACT_ADDRESS};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LEDGER_API_URL: &str = "https://api.netna.staging.aptoslabs.com/v1";
pub const DEFAULT_PROCESSOR_NAME: &str = "decibel-indexer";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub ledger_api_url: String,
    pub ledger_api_key: Option<String>,
    pub processor_name: String,
    pub contract_address: Address,
    pub start_version: u64,
    pub page_limit: u64,
    pub poll_delay: Duration,
    pub request_timeout: Duration,
    pub channel_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let ledger_api_url = env_map
            .get("LEDGER_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LEDGER_API_URL.to_string());
        if !ledger_api_url.starts_with("http://") && !ledger_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "LEDGER_API_URL".to_string(),
                "must be an http(s) URL".to_string(),
            ));
        }

        let ledger_api_key = env_map
            .get("LEDGER_API_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let processor_name = env_map
            .get("PROCESSOR_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROCESSOR_NAME.to_string());
        if processor_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "PROCESSOR_NAME".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let contract_address = Address::parse(
            env_map
                .get("CONTRACT_ADDRESS")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_CONTRACT_ADDRESS),
        )
        .map_err(|e| ConfigError::InvalidValue("CONTRACT_ADDRESS".to_string(), e.to_string()))?;

        let start_version = parse_or(&env_map, "START_VERSION", 0u64, "must be a valid u64")?;

        let page_limit = parse_or(&env_map, "PAGE_LIMIT", 100u64, "must be a valid u64")?;
        if page_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_LIMIT".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let poll_delay_ms = parse_or(&env_map, "POLL_DELAY_MS", 25u64, "must be a valid u64")?;

        let request_timeout_ms =
            parse_or(&env_map, "REQUEST_TIMEOUT_MS", 10_000u64, "must be a valid u64")?;
        if request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let channel_capacity =
            parse_or(&env_map, "CHANNEL_CAPACITY", 128usize, "must be a valid usize")?;
        if channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CHANNEL_CAPACITY".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            ledger_api_url,
            ledger_api_key,
            processor_name,
            contract_address,
            start_version,
            page_limit,
            poll_delay: Duration::from_millis(poll_delay_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            channel_capacity,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), reason.to_string())),
        None => Ok(default),
    }
}
