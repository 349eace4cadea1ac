use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Booksum server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Directory holding uploads, persisted summaries, and rendered audio.
    pub storage_dir: PathBuf,
    /// Maximum accepted upload body size in bytes.
    pub max_upload_bytes: usize,
    /// Word budget per chunk handed to the summarization model.
    pub max_chunk_words: usize,
    /// Lower length bound passed to the summarization model.
    pub summary_min_words: usize,
    /// Upper length bound passed to the summarization model.
    pub summary_max_words: usize,
    /// Pacing delay applied before each model call, in milliseconds.
    pub dispatch_delay_ms: u64,
    /// Summarization backend used by the dispatcher.
    pub summarization_provider: SummarizationProvider,
    /// Model identifier passed to the provider.
    pub summarization_model: String,
    /// Optional base URL override for the provider.
    pub summarization_url: Option<String>,
    /// Optional bearer token sent to the provider.
    pub summarization_api_token: Option<String>,
    /// Retries attempted per chunk after a failed model call (`0` disables retries).
    pub summarization_max_retries: u32,
    /// Base backoff between retries, doubled after every attempt.
    pub summarization_retry_backoff_ms: u64,
    /// Idle lifetime of a session before the reaper disposes of it.
    pub session_ttl_secs: u64,
    /// Interval between WebSocket keepalive pings.
    pub keepalive_interval_secs: u64,
    /// Executable used to render speech from the persisted summary.
    pub tts_command: String,
    /// Speaking rate (words per minute) passed to the speech command.
    pub tts_rate: u32,
}

/// Supported summarization backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Hugging Face inference API (`facebook/bart-large-cnn` by default).
    HuggingFace,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server_port: parse_optional("SERVER_PORT")?,
            storage_dir: load_env_optional("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 64 * 1024 * 1024)?,
            max_chunk_words: parse_or("MAX_CHUNK_WORDS", 500)?,
            summary_min_words: parse_or("SUMMARY_MIN_WORDS", 20)?,
            summary_max_words: parse_or("SUMMARY_MAX_WORDS", 60)?,
            dispatch_delay_ms: parse_or("DISPATCH_DELAY_MS", 100)?,
            summarization_provider: load_env_optional("SUMMARIZATION_PROVIDER")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("SUMMARIZATION_PROVIDER".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(SummarizationProvider::HuggingFace),
            summarization_model: load_env_optional("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| "facebook/bart-large-cnn".to_string()),
            summarization_url: load_env_optional("SUMMARIZATION_URL"),
            summarization_api_token: load_env_optional("SUMMARIZATION_API_TOKEN"),
            summarization_max_retries: parse_or("SUMMARIZATION_MAX_RETRIES", 0)?,
            summarization_retry_backoff_ms: parse_or("SUMMARIZATION_RETRY_BACKOFF_MS", 500)?,
            session_ttl_secs: parse_or("SESSION_TTL_SECS", 3600)?,
            keepalive_interval_secs: parse_or("KEEPALIVE_INTERVAL_SECS", 1440)?,
            tts_command: load_env_optional("TTS_COMMAND").unwrap_or_else(|| "espeak".to_string()),
            tts_rate: parse_or("TTS_RATE", 150)?,
        };

        if config.max_chunk_words == 0 {
            return Err(ConfigError::InvalidValue("MAX_CHUNK_WORDS".into()));
        }
        if config.summary_min_words > config.summary_max_words {
            return Err(ConfigError::InvalidValue("SUMMARY_MIN_WORDS".into()));
        }
        Ok(config)
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key)?.unwrap_or(default))
}

impl FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Command-line overrides applied on top of the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Replaces `SERVER_PORT`.
    pub server_port: Option<u16>,
    /// Replaces `STORAGE_DIR`.
    pub storage_dir: Option<PathBuf>,
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    init_config_with(ConfigOverrides::default())
}

/// Load configuration from the environment, apply CLI overrides, and install it.
pub fn init_config_with(overrides: ConfigOverrides) -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    if let Some(port) = overrides.server_port {
        config.server_port = Some(port);
    }
    if let Some(dir) = overrides.storage_dir {
        config.storage_dir = dir;
    }
    tracing::debug!(
        storage_dir = %config.storage_dir.display(),
        server_port = ?config.server_port,
        provider = ?config.summarization_provider,
        model = %config.summarization_model,
        max_chunk_words = config.max_chunk_words,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
