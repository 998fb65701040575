//! Tiered classification: allowlist → similarity → model fallback.
//!
//! Tiers run in strict priority order and the first Positive wins — a later
//! tier is consulted only when every earlier tier declined to resolve. The
//! model fallback is fail-closed: an ambiguous response is a Negative
//! verdict, never a forwarded notification.

pub mod allowlist;

pub use allowlist::Allowlist;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channels::Item;
use crate::config::{DEFAULT_MAX_CONTENT_CHARS, DEFAULT_SIMILARITY_THRESHOLD};
use crate::error::ClassifyError;
use crate::index::PassageRetriever;
use crate::llm::CompletionClient;

/// Category code the fallback prompt instructs the model to answer with for
/// a work-relevant item. Any other response is Negative.
const CODE_POSITIVE: &str = "1";

/// Which tier resolved the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Allowlist,
    SimilarityMatch,
    ModelFallback,
}

/// Binary classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Positive,
    Negative,
}

/// Final verdict for one item. Produced once per run; never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub decision: Decision,
    pub tier: Tier,
    /// Relevance score, present only when the similarity tier resolved.
    pub confidence: Option<f32>,
}

impl ClassificationVerdict {
    pub fn is_positive(&self) -> bool {
        self.decision == Decision::Positive
    }
}

impl fmt::Display for ClassificationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decision = match self.decision {
            Decision::Positive => "positive",
            Decision::Negative => "negative",
        };
        let tier = match self.tier {
            Tier::Allowlist => "allowlist",
            Tier::SimilarityMatch => "similarity",
            Tier::ModelFallback => "model",
        };
        match self.confidence {
            Some(score) => write!(f, "{decision} ({tier}, score {score:.2})"),
            None => write!(f, "{decision} ({tier})"),
        }
    }
}

/// Confidence-gated, multi-tier item classifier.
///
/// All leaf services are injected at construction; the classifier holds no
/// per-call mutable state and is safe for concurrent read-only use.
pub struct TieredClassifier {
    allowlist: Allowlist,
    retriever: Arc<dyn PassageRetriever>,
    llm: Arc<dyn CompletionClient>,
    similarity_threshold: f32,
    max_content_chars: usize,
}

impl TieredClassifier {
    pub fn new(
        allowlist: Allowlist,
        retriever: Arc<dyn PassageRetriever>,
        llm: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            allowlist,
            retriever,
            llm,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    /// Classify one item.
    ///
    /// Transport failures from the similarity index or completion service
    /// propagate as `ClassifyError` — they are infrastructure problems, not
    /// Negative verdicts.
    pub async fn classify(&self, item: &Item) -> Result<ClassificationVerdict, ClassifyError> {
        // Tier 1: allowlist. No external call; skipped for items without a
        // sender (questions, malformed headers).
        if let Some(sender) = item.sender.as_deref()
            && !sender.is_empty()
            && self.allowlist.contains(sender)
        {
            debug!(id = %item.id, sender = %sender, "Allowlist tier resolved positive");
            return Ok(ClassificationVerdict {
                decision: Decision::Positive,
                tier: Tier::Allowlist,
                confidence: None,
            });
        }

        // Tier 2: best similarity match against the reference corpus. An
        // empty index falls through without error.
        let query = build_similarity_query(item);
        let matches = self.retriever.query(&query, 1).await?;
        if let Some(top) = matches.first()
            && top.score > self.similarity_threshold
        {
            debug!(
                id = %item.id,
                score = top.score,
                "Similarity tier resolved positive"
            );
            return Ok(ClassificationVerdict {
                decision: Decision::Positive,
                tier: Tier::SimilarityMatch,
                confidence: Some(top.score),
            });
        }

        // Tier 3: closed-ended model fallback.
        let prompt = build_category_prompt(item, self.max_content_chars);
        let response = self.llm.complete(&prompt).await?;
        let decision = if response.contains(CODE_POSITIVE) {
            Decision::Positive
        } else {
            // Fail-closed: anything unparseable is Negative.
            debug!(
                id = %item.id,
                response = %response.chars().take(80).collect::<String>(),
                "Model fallback did not contain the positive code"
            );
            Decision::Negative
        };

        Ok(ClassificationVerdict {
            decision,
            tier: Tier::ModelFallback,
            confidence: None,
        })
    }
}

/// Query string for the similarity tier — subject and body together, so an
/// item with an empty body still queries on its subject.
fn build_similarity_query(item: &Item) -> String {
    format!(
        "Subject: {}\nBody: {}",
        item.subject.as_deref().unwrap_or(""),
        item.body
    )
}

/// Closed-ended category prompt for the model fallback tier. The body is
/// truncated to `max_content_chars` to bound token cost.
fn build_category_prompt(item: &Item, max_content_chars: usize) -> String {
    let body: String = item.body.chars().take(max_content_chars).collect();
    format!(
        "Classify this email strictly:\n\n\
         Subject: {}\n\
         Body: {}\n\n\
         Reply only with one number: (1) Work, (2) Non-Work, (3) Spam.",
        item.subject.as_deref().unwrap_or(""),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::error::{IndexError, LlmError};
    use crate::index::ScoredPassage;

    fn make_item(sender: Option<&str>, subject: Option<&str>, body: &str) -> Item {
        Item {
            id: "item-1".into(),
            sender: sender.map(String::from),
            subject: subject.map(String::from),
            body: body.into(),
            permalink: None,
            received_at: Utc::now(),
        }
    }

    /// Retriever returning a fixed top match (or failing).
    struct MockRetriever {
        result: Result<Vec<ScoredPassage>, &'static str>,
        calls: AtomicUsize,
    }

    impl MockRetriever {
        fn with_top_score(score: f32) -> Self {
            Self {
                result: Ok(vec![ScoredPassage {
                    text: "reference passage".into(),
                    score,
                }]),
                calls: AtomicUsize::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                result: Ok(vec![]),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err("index down"),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PassageRetriever for MockRetriever {
        async fn query(
            &self,
            _text: &str,
            _top_k: usize,
        ) -> Result<Vec<ScoredPassage>, IndexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(passages) => Ok(passages.clone()),
                Err(reason) => Err(IndexError::Embed(LlmError::Transport(
                    reason.to_string(),
                ))),
            }
        }
    }

    /// Completion client returning a fixed response (or failing), counting calls.
    struct MockLlm {
        response: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl MockLlm {
        fn returning(response: &'static str) -> Self {
            Self {
                response: Ok(response),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(LlmError::Transport("completion service down".into())),
            }
        }
    }

    fn classifier(
        allowlist: Allowlist,
        retriever: Arc<MockRetriever>,
        llm: Arc<MockLlm>,
    ) -> TieredClassifier {
        TieredClassifier::new(allowlist, retriever, llm)
    }

    #[tokio::test]
    async fn allowlisted_sender_positive_even_when_leaves_fail() {
        // Both leaf services fail; the allowlist tier must still resolve.
        let retriever = Arc::new(MockRetriever::failing());
        let llm = Arc::new(MockLlm::failing());
        let c = classifier(
            Allowlist::from_senders(["boss@company.com"]),
            Arc::clone(&retriever),
            Arc::clone(&llm),
        );

        let item = make_item(Some("boss@company.com"), Some("Q3 plan"), "numbers inside");
        let verdict = c.classify(&item).await.unwrap();

        assert!(verdict.is_positive());
        assert_eq!(verdict.tier, Tier::Allowlist);
        assert_eq!(verdict.confidence, None);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn similarity_above_threshold_skips_completion() {
        let retriever = Arc::new(MockRetriever::with_top_score(0.85));
        let llm = Arc::new(MockLlm::returning("1"));
        let c = classifier(Allowlist::empty(), Arc::clone(&retriever), Arc::clone(&llm));

        let item = make_item(Some("new@client.com"), Some("Contract"), "please review");
        let verdict = c.classify(&item).await.unwrap();

        assert!(verdict.is_positive());
        assert_eq!(verdict.tier, Tier::SimilarityMatch);
        assert_eq!(verdict.confidence, Some(0.85));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn similarity_at_threshold_falls_through() {
        // Threshold is strict: a score of exactly 0.7 does not resolve.
        let retriever = Arc::new(MockRetriever::with_top_score(0.7));
        let llm = Arc::new(MockLlm::returning("2"));
        let c = classifier(Allowlist::empty(), retriever, Arc::clone(&llm));

        let item = make_item(Some("x@y.com"), None, "hello");
        let verdict = c.classify(&item).await.unwrap();

        assert_eq!(verdict.tier, Tier::ModelFallback);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn fallback_consults_model_exactly_once() {
        let retriever = Arc::new(MockRetriever::empty());
        let llm = Arc::new(MockLlm::returning("1"));
        let c = classifier(Allowlist::empty(), retriever, Arc::clone(&llm));

        let item = make_item(Some("a@b.com"), Some("Hi"), "body");
        let verdict = c.classify(&item).await.unwrap();

        assert!(verdict.is_positive());
        assert_eq!(verdict.tier, Tier::ModelFallback);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn fallback_negative_without_positive_code() {
        let retriever = Arc::new(MockRetriever::empty());
        let llm = Arc::new(MockLlm::returning("3"));
        let c = classifier(Allowlist::empty(), retriever, llm);

        let item = make_item(Some("a@b.com"), Some("Hi"), "body");
        let verdict = c.classify(&item).await.unwrap();

        assert!(!verdict.is_positive());
        assert_eq!(verdict.tier, Tier::ModelFallback);
        assert_eq!(verdict.confidence, None);
    }

    #[tokio::test]
    async fn fallback_treats_empty_response_as_negative() {
        let retriever = Arc::new(MockRetriever::empty());
        let llm = Arc::new(MockLlm::returning(""));
        let c = classifier(Allowlist::empty(), retriever, llm);

        let item = make_item(Some("a@b.com"), None, "body");
        let verdict = c.classify(&item).await.unwrap();
        assert!(!verdict.is_positive());
    }

    #[tokio::test]
    async fn classify_is_idempotent_with_deterministic_leaves() {
        let retriever = Arc::new(MockRetriever::empty());
        let llm = Arc::new(MockLlm::returning("1"));
        let c = classifier(Allowlist::empty(), retriever, llm);

        let item = make_item(Some("a@b.com"), Some("Hi"), "body");
        let first = c.classify(&item).await.unwrap();
        let second = c.classify(&item).await.unwrap();

        assert_eq!(first.decision, second.decision);
        assert_eq!(first.tier, second.tier);
    }

    #[tokio::test]
    async fn empty_sender_skips_allowlist_tier() {
        // An empty-string sender must not match anything, and the similarity
        // tier still runs.
        let retriever = Arc::new(MockRetriever::with_top_score(0.9));
        let llm = Arc::new(MockLlm::failing());
        let c = classifier(
            Allowlist::from_senders([""]),
            Arc::clone(&retriever),
            llm,
        );

        let item = make_item(Some(""), Some("Hi"), "body");
        let verdict = c.classify(&item).await.unwrap();
        assert_eq!(verdict.tier, Tier::SimilarityMatch);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_body_queries_on_subject_alone() {
        let retriever = Arc::new(MockRetriever::with_top_score(0.95));
        let llm = Arc::new(MockLlm::failing());
        let c = classifier(Allowlist::empty(), retriever, llm);

        let item = make_item(Some("a@b.com"), Some("Standup moved to 10am"), "");
        let verdict = c.classify(&item).await.unwrap();
        assert!(verdict.is_positive());
        assert_eq!(verdict.tier, Tier::SimilarityMatch);
    }

    #[tokio::test]
    async fn index_failure_propagates_not_negative() {
        let retriever = Arc::new(MockRetriever::failing());
        let llm = Arc::new(MockLlm::returning("1"));
        let c = classifier(Allowlist::empty(), retriever, Arc::clone(&llm));

        let item = make_item(Some("a@b.com"), None, "body");
        let result = c.classify(&item).await;

        assert!(matches!(result, Err(ClassifyError::Index(_))));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn completion_failure_propagates_not_negative() {
        let retriever = Arc::new(MockRetriever::empty());
        let llm = Arc::new(MockLlm::failing());
        let c = classifier(Allowlist::empty(), retriever, llm);

        let item = make_item(Some("a@b.com"), None, "body");
        let result = c.classify(&item).await;
        assert!(matches!(result, Err(ClassifyError::Llm(_))));
    }

    #[test]
    fn category_prompt_truncates_long_bodies() {
        let item = make_item(Some("a@b.com"), Some("S"), &"x".repeat(2000));
        let prompt = build_category_prompt(&item, 500);

        let scaffolding = build_category_prompt(
            &make_item(Some("a@b.com"), Some("S"), ""),
            500,
        );
        // Prompt length is bounded by scaffolding plus the content cap.
        assert!(prompt.chars().count() <= scaffolding.chars().count() + 500);
        assert!(prompt.contains(&"x".repeat(500)));
        assert!(!prompt.contains(&"x".repeat(501)));
    }

    #[test]
    fn category_prompt_truncation_respects_char_boundaries() {
        // Multibyte content must not panic on truncation.
        let item = make_item(None, None, &"é".repeat(600));
        let prompt = build_category_prompt(&item, 500);
        assert!(prompt.contains(&"é".repeat(500)));
        assert!(!prompt.contains(&"é".repeat(501)));
    }

    #[test]
    fn similarity_query_includes_subject_and_body() {
        let item = make_item(None, Some("Invoice #42"), "Payment due Friday");
        let query = build_similarity_query(&item);
        assert!(query.contains("Invoice #42"));
        assert!(query.contains("Payment due Friday"));
    }

    #[test]
    fn verdict_display_formats() {
        let v = ClassificationVerdict {
            decision: Decision::Positive,
            tier: Tier::SimilarityMatch,
            confidence: Some(0.853),
        };
        assert_eq!(v.to_string(), "positive (similarity, score 0.85)");

        let v = ClassificationVerdict {
            decision: Decision::Negative,
            tier: Tier::ModelFallback,
            confidence: None,
        };
        assert_eq!(v.to_string(), "negative (model)");
    }
}
