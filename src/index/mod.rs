//! In-memory text-similarity index over the reference corpus.
//!
//! Passages are embedded once at startup and held read-only for the process
//! lifetime. Queries embed the query text and rank passages by cosine
//! similarity, reported as a relevance score in [0, 1].

pub mod loader;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::llm::Embedder;

/// A retrieved passage with its relevance score in [0, 1].
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
}

/// Read-only retrieval boundary over the reference corpus.
///
/// An empty result list is a normal outcome, not an error.
#[async_trait]
pub trait PassageRetriever: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredPassage>, IndexError>;
}

/// A pre-embedded corpus passage.
#[derive(Debug, Clone)]
struct CorpusEntry {
    text: String,
    vector: Vec<f32>,
}

/// Vector index built from the reference corpus at startup.
pub struct SimilarityIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<CorpusEntry>,
}

impl SimilarityIndex {
    /// Embed every passage and build the index.
    ///
    /// All entries must share one embedding dimension; a model that returns
    /// inconsistent dimensions is a configuration problem worth failing on.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        passages: Vec<String>,
    ) -> Result<Self, IndexError> {
        let mut entries = Vec::with_capacity(passages.len());
        let mut dimension: Option<usize> = None;

        for text in passages {
            let vector = embedder.embed(&text).await.map_err(IndexError::Embed)?;
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
                Some(_) => {}
            }
            entries.push(CorpusEntry { text, vector });
        }

        if entries.is_empty() {
            warn!("Similarity index is empty — similarity tier will never resolve");
        } else {
            debug!(passages = entries.len(), "Similarity index built");
        }

        Ok(Self { embedder, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PassageRetriever for SimilarityIndex {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredPassage>, IndexError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(text).await.map_err(IndexError::Embed)?;

        let mut scored: Vec<ScoredPassage> = self
            .entries
            .iter()
            .map(|entry| ScoredPassage {
                text: entry.text.clone(),
                score: cosine_similarity(&query_vector, &entry.vector).clamp(0.0, 1.0),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude or
/// the dimensions disagree.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
