use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use smart_default::SmartDefault;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://extra-brooke-yeremiadio-46b2183e.koyeb.app";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, SmartDefault)]
pub struct ClientConfig {
    #[default(_code = "DEFAULT_API_URL.to_string()")]
    pub api_url: String,

    #[default(9)]
    pub page_size: u32,

    #[default(10)]
    pub comment_page_size: u32,

    /// Freshness window of the category cache.
    #[default(_code = "Duration::from_secs(300)")]
    pub category_ttl: Duration,

    #[default(_code = "Duration::from_secs(30)")]
    pub request_timeout: Duration,

    #[default(_code = "default_session_file()")]
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Defaults overridden by `WAYFARER_*` variables (and a `.env` file).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("WAYFARER_API_URL") {
            config.api_url = non_empty("WAYFARER_API_URL", url)?;
        }
        if let Some(value) = lookup("WAYFARER_PAGE_SIZE") {
            config.page_size = positive("WAYFARER_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("WAYFARER_COMMENT_PAGE_SIZE") {
            config.comment_page_size = positive("WAYFARER_COMMENT_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("WAYFARER_CATEGORY_TTL_SECS") {
            config.category_ttl = Duration::from_secs(parse("WAYFARER_CATEGORY_TTL_SECS", &value)?);
        }
        if let Some(value) = lookup("WAYFARER_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(positive("WAYFARER_TIMEOUT_SECS", &value)?);
        }
        if let Some(path) = lookup("WAYFARER_SESSION_FILE") {
            config.session_file = PathBuf::from(non_empty("WAYFARER_SESSION_FILE", path)?);
        }

        Ok(config)
    }
}

fn default_session_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wayfarer")
        .join("session.json")
}

fn non_empty(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty { name });
    }
    Ok(value.trim().to_string())
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn positive<T: FromStr + Default + PartialOrd>(
    name: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    let parsed: T = parse(name, value)?;
    if parsed <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(parsed)
}
