//! Text-completion and embedding service boundaries.
//!
//! Both pipelines treat the language model as a prompt-in/text-out service
//! behind `CompletionClient`, and the similarity index sees embeddings only
//! through `Embedder`. Production implementations target a local Ollama
//! server; tests substitute deterministic doubles.

pub mod ollama;

pub use ollama::{OllamaClient, OllamaEmbedder};

use async_trait::async_trait;

use crate::error::LlmError;

/// Text-completion service boundary.
///
/// Implementations must be safe for concurrent read-only use — no per-call
/// mutable state — and must surface timeouts distinctly from other transport
/// failures.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier, for diagnostics.
    fn model_name(&self) -> &str;

    /// Generate text for `prompt`, blocking until the model answers or the
    /// configured timeout elapses.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Text-embedding service boundary used by the similarity index.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}
