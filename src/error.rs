//! Error types for ai-workflows.
//!
//! One enum per subsystem, aggregated into a top-level `Error`. Timeouts are
//! kept distinct from other transport failures throughout: a caller must be
//! able to tell an unreachable model from a model that answered nonsense.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Completion error: {0}")]
    Llm(#[from] LlmError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion service errors.
///
/// `Timeout` means the model did not answer in time; `Transport` and `Api`
/// are other connectivity or protocol failures. The core never retries any
/// of these — the distinction exists so diagnostics can say which happened.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model {model} timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },

    #[error("completion transport failed: {0}")]
    Transport(String),

    #[error("completion endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed completion payload: {0}")]
    InvalidPayload(String),
}

impl LlmError {
    /// Whether this is a timeout, as opposed to another transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Similarity index errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embed(#[source] LlmError),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("corpus load failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Item source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("source transport failed: {0}")]
    Transport(String),

    #[error("source endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode item {id}: {reason}")]
    Decode { id: String, reason: String },
}

/// Notification sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("notification send failed: {0}")]
    Send(String),

    #[error("notification endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Classification errors — leaf-service failures surfaced by a tier.
///
/// An ambiguous model response is NOT an error; the classifier resolves it as
/// a Negative verdict. Only transport-level failures land here.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("similarity tier failed: {0}")]
    Index(#[from] IndexError),

    #[error("model fallback tier failed: {0}")]
    Llm(#[from] LlmError),
}

/// Pipeline errors. Each variant names the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch stage failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("classify stage failed: {0}")]
    Classify(#[from] ClassifyError),

    #[error("retrieve stage failed: {0}")]
    Retrieve(#[from] IndexError),

    #[error("{stage} stage failed: {source}")]
    Completion {
        stage: &'static str,
        #[source]
        source: LlmError,
    },
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Classify(_) => "classify",
            Self::Retrieve(_) => "retrieve",
            Self::Completion { stage, .. } => stage,
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
