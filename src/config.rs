use std::{env, net::SocketAddr, time::Duration};

use reqwest::Url;
use thiserror::Error;

pub const TODOIST_API_KEY_VAR: &str = "TODOIST_API_KEY";
pub const DEFAULT_TODOIST_BASE_URL: &str = "https://api.todoist.com/rest/v2";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub todoist_api_key: Option<String>,
    pub todoist_base_url: Url,
    pub todoist_timeout: Duration,
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("TODOIST_API_BASE_URL must be an absolute http(s) URL")]
    InvalidBaseUrl,
    #[error("TODOIST_TIMEOUT_SECS must be a positive integer")]
    InvalidTimeout,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        // Absence is reported per initialization request, not at startup.
        let todoist_api_key = var(TODOIST_API_KEY_VAR);
        let api_token = var("MCP_API_TOKEN");

        let todoist_base_url = var("TODOIST_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_TODOIST_BASE_URL.to_string());
        let todoist_base_url = Url::parse(todoist_base_url.trim_end_matches('/'))
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or(ConfigError::InvalidBaseUrl)?;

        let todoist_timeout = var("TODOIST_TIMEOUT_SECS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::InvalidTimeout)
            })
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind_port = var("PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let config = Self {
            todoist_api_key,
            todoist_base_url,
            todoist_timeout,
            api_token,
            bind_addr,
            bind_port,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
