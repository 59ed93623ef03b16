//! Configuration for the access core.
//!
//! ```bash
//! CREWGATE_JOIN_URL=https://boards.example.com/join   # base of shareable join links
//! ```

use std::env;
use thiserror::Error;

pub const DEFAULT_JOIN_URL: &str = "http://localhost:3000/join";

#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Base URL the invitation token is appended to as a `token` query parameter.
    pub join_base_url: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid join URL: {0}. Expected an http:// or https:// URL")]
    InvalidJoinUrl(String),
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            join_base_url: DEFAULT_JOIN_URL.to_string(),
        }
    }
}

impl AccessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let join_base_url = match lookup("CREWGATE_JOIN_URL") {
            Some(url) => url.trim().to_string(),
            None => return Ok(Self::default()),
        };
        Self::with_join_url(join_base_url)
    }

    pub fn with_join_url(join_base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let join_base_url = join_base_url.into();
        let has_scheme =
            join_base_url.starts_with("http://") || join_base_url.starts_with("https://");
        if !has_scheme || join_base_url.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidJoinUrl(join_base_url));
        }
        Ok(Self { join_base_url })
    }
}
