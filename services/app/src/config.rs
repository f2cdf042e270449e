use magic_stories_core::backend::ModelSet;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where stories come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    /// Canned story, image and chime; no network access.
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub models: ModelSet,
    pub voice: String,
    pub request_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend_str = std::env::var("STORY_BACKEND").unwrap_or_else(|_| "gemini".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "gemini" => BackendKind::Gemini,
            "offline" => BackendKind::Offline,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORY_BACKEND".to_string(),
                    format!("'{other}' is not one of 'gemini', 'offline'"),
                ));
            }
        };

        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| gemini_content::DEFAULT_BASE_URL.to_string());

        let defaults = ModelSet::default();
        let models = ModelSet {
            text: std::env::var("TEXT_MODEL").unwrap_or(defaults.text),
            image: std::env::var("IMAGE_MODEL").unwrap_or(defaults.image),
            speech: std::env::var("TTS_MODEL").unwrap_or(defaults.speech),
        };

        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "Puck".to_string());

        let timeout_str =
            std::env::var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "120".to_string());
        let request_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        if backend == BackendKind::Gemini && api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY (or API_KEY) must be set for the 'gemini' backend".to_string(),
            ));
        }

        Ok(Self {
            backend,
            api_key,
            base_url,
            models,
            voice,
            request_timeout,
            log_level,
        })
    }
}
