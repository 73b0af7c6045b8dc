use std::env;
use std::time::Duration;

const DEFAULT_GHIBLI_API_BASE: &str = "https://ghibliapi.dev";
const DEFAULT_FIREBASE_AUTH_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_ADVANCE_DELAY_MS: u64 = 1000;
const DEFAULT_DIALOGUE_DB: &str = "db.sqlite";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime settings. The Telegram token itself is read by `Bot::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub ghibli_api_base: String,
    pub firebase_api_key: String,
    pub firebase_auth_endpoint: String,
    pub advance_delay: Duration,
    pub dialogue_db: String,
}

impl Config {
    /// Expects `.env` to have been loaded already.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ghibli_api_base: get_env_or("GHIBLI_API_BASE", DEFAULT_GHIBLI_API_BASE),
            firebase_api_key: get_env("FIREBASE_API_KEY")?,
            firebase_auth_endpoint: get_env_or(
                "FIREBASE_AUTH_ENDPOINT",
                DEFAULT_FIREBASE_AUTH_ENDPOINT,
            ),
            advance_delay: Duration::from_millis(get_env_parse_or(
                "QUIZ_ADVANCE_DELAY_MS",
                DEFAULT_ADVANCE_DELAY_MS,
            )?),
            dialogue_db: get_env_or("DIALOGUE_DB", DEFAULT_DIALOGUE_DB),
        })
    }
}

fn get_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn get_env_or(name: &'static str, default: &str) -> String {
    get_env(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
