//! Environment-driven configuration.
//!
//! Each subsystem has a small config struct with a `from_env()` constructor.
//! Tunables fall back to defaults; secrets and endpoints are required and
//! fail with `ConfigError::MissingEnvVar` when absent.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default cap on body text embedded in any classification or summary prompt.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 500;

/// Default relevance score a retrieved passage must exceed to resolve the
/// similarity tier.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// Default passage count for Q&A context retrieval.
pub const DEFAULT_RETRIEVE_TOP_K: usize = 2;

/// Default completion request timeout.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 600;

/// Default triage poll interval: 5 minutes.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Parse an env var, falling back to `default` when unset. A present but
/// malformed value is a configuration error, not a silent default.
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Completion and embedding service configuration (Ollama endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Completion model identifier.
    pub model: String,
    /// Embedding model identifier.
    pub embed_model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
    /// Cap on generated response length, in tokens.
    pub max_response_tokens: u32,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| "deepseek-r1:7b".to_string()),
            embed_model: std::env::var("OLLAMA_EMBED_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".to_string()),
            timeout: Duration::from_secs(env_or(
                "OLLAMA_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
            temperature: env_or("OLLAMA_TEMPERATURE", 0.3)?,
            max_response_tokens: env_or("OLLAMA_MAX_RESPONSE_TOKENS", 512)?,
        })
    }
}

/// Tiered-classifier and triage-pipeline tunables.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Path to the trusted-sender allowlist file (one sender per line).
    pub allowlist_file: PathBuf,
    /// Relevance score the similarity tier must exceed.
    pub similarity_threshold: f32,
    /// Cap on body text embedded in prompts.
    pub max_content_chars: usize,
    /// Poll interval for watch mode.
    pub poll_interval: Duration,
}

impl TriageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            allowlist_file: std::env::var("ALLOWLIST_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/work_senders.txt")),
            similarity_threshold: env_or(
                "SIMILARITY_THRESHOLD",
                DEFAULT_SIMILARITY_THRESHOLD,
            )?,
            max_content_chars: env_or("MAX_CONTENT_CHARS", DEFAULT_MAX_CONTENT_CHARS)?,
            poll_interval: Duration::from_secs(env_or(
                "TRIAGE_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
        })
    }
}

/// Reference-corpus retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Directory of .md/.txt reference documents, embedded at startup.
    pub corpus_dir: PathBuf,
    /// Passage count for Q&A retrieval.
    pub top_k: usize,
}

impl RetrievalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            corpus_dir: std::env::var("CORPUS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/docs")),
            top_k: env_or("RETRIEVE_TOP_K", DEFAULT_RETRIEVE_TOP_K)?,
        })
    }
}

/// Telegram notification sink configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: SecretString::from(require("TELEGRAM_BOT_TOKEN")?),
            chat_id: require("TELEGRAM_CHAT_ID")?,
        })
    }
}

/// Gmail item source configuration.
///
/// Token acquisition and refresh happen outside this process; a pre-issued
/// bearer token arrives through the environment.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub access_token: SecretString,
    /// Gmail user id, normally the literal "me".
    pub user: String,
}

impl GmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_token: SecretString::from(require("GMAIL_ACCESS_TOKEN")?),
            user: std::env::var("GMAIL_USER").unwrap_or_else(|_| "me".to_string()),
        })
    }
}
