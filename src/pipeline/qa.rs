//! Q&A pipeline: analyze → retrieve → answer → review.
//!
//! A single run refines the question, pulls top-k context passages, answers
//! in a fixed child-friendly register, then makes exactly one review pass.
//! Any stage failure aborts the run with an error naming the stage.

use std::sync::Arc;

use tracing::{error, info};

use crate::channels::Item;
use crate::config::DEFAULT_RETRIEVE_TOP_K;
use crate::error::{LlmError, PipelineError};
use crate::index::PassageRetriever;
use crate::llm::CompletionClient;
use crate::pipeline::context::PipelineContext;

/// Marker the reviewer embeds when the answer needs no changes.
const APPROVED_MARKER: &str = "APPROVED";

/// Result of the single review pass.
///
/// `Approved` keeps the pre-review answer verbatim; `Revised` replaces it
/// with the reviewer's text — including an empty string, which replaces the
/// answer with empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved,
    Revised(String),
}

/// A completed Q&A run.
#[derive(Debug)]
pub struct QaRun {
    pub final_answer: String,
    pub review: ReviewOutcome,
    pub context: PipelineContext,
}

/// Orchestrates one analyze → retrieve → answer → review sequence.
pub struct QaPipeline {
    llm: Arc<dyn CompletionClient>,
    retriever: Arc<dyn PassageRetriever>,
    top_k: usize,
}

impl QaPipeline {
    pub fn new(llm: Arc<dyn CompletionClient>, retriever: Arc<dyn PassageRetriever>) -> Self {
        Self {
            llm,
            retriever,
            top_k: DEFAULT_RETRIEVE_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Run the pipeline for one question.
    pub async fn run(&self, question: &str) -> Result<QaRun, PipelineError> {
        let mut ctx = PipelineContext::new(Item::question(question));
        info!(run_id = %ctx.run_id, "Q&A run started");

        // Analyze — not retried; a failure here aborts the run.
        let refined = match self.llm.complete(&build_analyze_prompt(question)).await {
            Ok(text) => text,
            Err(e) => {
                log_analyze_failure(&e);
                return Err(PipelineError::Completion {
                    stage: "analyze",
                    source: e,
                });
            }
        };
        ctx.record("analyze", refined.clone());

        // Retrieve — an empty result set yields empty context, not an error.
        let passages = self.retriever.query(&refined, self.top_k).await?;
        let context_text = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        ctx.record("retrieve", context_text.clone());

        // Answer
        let answer = self
            .llm
            .complete(&build_answer_prompt(&refined, &context_text))
            .await
            .map_err(|e| PipelineError::Completion {
                stage: "answer",
                source: e,
            })?;
        ctx.record("answer", answer.clone());

        // Review — one pass, never iterated.
        let review_text = self
            .llm
            .complete(&build_review_prompt(&answer))
            .await
            .map_err(|e| PipelineError::Completion {
                stage: "review",
                source: e,
            })?;
        let review = if review_text.contains(APPROVED_MARKER) {
            ReviewOutcome::Approved
        } else {
            ReviewOutcome::Revised(review_text)
        };
        let final_answer = match &review {
            ReviewOutcome::Approved => answer,
            ReviewOutcome::Revised(text) => text.clone(),
        };
        ctx.record("review", final_answer.clone());
        let approved = review == ReviewOutcome::Approved;
        info!(run_id = %ctx.run_id, approved, "Q&A run complete");

        Ok(QaRun {
            final_answer,
            review,
            context: ctx,
        })
    }
}

/// Question-cleanup prompt: fix spelling and phrasing, keep meaning.
fn build_analyze_prompt(question: &str) -> String {
    format!(
        "A child asked a question. If the question is already clear, return \
         it unchanged. If it has problems (spelling mistakes, illogical \
         phrasing), rewrite it clearly. Reply with only the cleaned-up \
         question.\n\n\
         Original: {question}\n\
         Result:"
    )
}

/// Persona-constrained answer prompt combining retrieved context and the
/// refined question.
fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a teacher for children aged 3-6. The child is asking a \
         question. Use simple words, short sentences, and playful examples, \
         but explain the concept fully.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\
         Answer:"
    )
}

/// Revision prompt for the single review pass.
fn build_review_prompt(answer: &str) -> String {
    format!(
        "Review this answer for a 3-6 year old. Ensure it is:\n\
         - Accurate\n\
         - Simple (no complex words)\n\
         - Engaging (uses stories or analogies)\n\
         - Safe (no inappropriate content)\n\n\
         Answer: {answer}\n\n\
         Reply with a revised answer, or '{APPROVED_MARKER}' if no changes \
         are needed:"
    )
}

/// Log an analyze-stage failure with remediation hints before re-raising.
fn log_analyze_failure(err: &LlmError) {
    error!(error = %err, "Analyze stage failed");
    if err.is_timeout() {
        error!("Completion service timed out. Possible fixes:");
        error!("1. Check the model is loaded: `ollama ls`");
        error!("2. Raise OLLAMA_TIMEOUT_SECS (large models answer slowly)");
        error!("3. Try a smaller model first: `ollama run deepseek-7b`");
    }
}
