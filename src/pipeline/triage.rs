//! Triage pipeline: fetch → classify → summarize → notify.
//!
//! Short-circuit semantics: no unprocessed item and a Negative verdict are
//! successful terminal outcomes, not errors. Stages are not transactional —
//! a failed notification is reported but does not roll back the run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::channels::{Item, ItemSource, NotificationSink};
use crate::classifier::{ClassificationVerdict, TieredClassifier};
use crate::config::DEFAULT_MAX_CONTENT_CHARS;
use crate::error::PipelineError;
use crate::llm::CompletionClient;
use crate::pipeline::context::PipelineContext;

/// Terminal outcome of one triage run.
#[derive(Debug)]
pub enum TriageOutcome {
    /// Source had nothing unprocessed.
    NoItem,
    /// Classification was Negative; summarize and notify never ran.
    Filtered { verdict: ClassificationVerdict },
    /// Summary built and handed to the sink.
    Notified {
        verdict: ClassificationVerdict,
        summary: String,
        /// False when the sink rejected the delivery (reported, non-fatal).
        delivered: bool,
    },
}

impl TriageOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoItem => "no_item",
            Self::Filtered { .. } => "filtered",
            Self::Notified { .. } => "notified",
        }
    }
}

/// A completed triage run: the outcome plus the per-run context, when an
/// item was fetched.
#[derive(Debug)]
pub struct TriageRun {
    pub outcome: TriageOutcome,
    pub context: Option<PipelineContext>,
}

/// Orchestrates one fetch → classify → summarize → notify sequence.
pub struct TriagePipeline {
    source: Arc<dyn ItemSource>,
    classifier: TieredClassifier,
    llm: Arc<dyn CompletionClient>,
    sink: Arc<dyn NotificationSink>,
    max_content_chars: usize,
}

impl TriagePipeline {
    pub fn new(
        source: Arc<dyn ItemSource>,
        classifier: TieredClassifier,
        llm: Arc<dyn CompletionClient>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            source,
            classifier,
            llm,
            sink,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    /// Run the pipeline once against the newest unprocessed item.
    pub async fn run(&self) -> Result<TriageRun, PipelineError> {
        // Fetch
        let refs = self.source.list_unprocessed(1).await?;
        let Some(item_ref) = refs.into_iter().next() else {
            info!(source = self.source.name(), "No unprocessed items");
            return Ok(TriageRun {
                outcome: TriageOutcome::NoItem,
                context: None,
            });
        };
        let item = self.source.get(&item_ref.id).await?;
        info!(
            id = %item.id,
            sender = item.sender.as_deref().unwrap_or("(none)"),
            "Fetched item"
        );

        let mut ctx = PipelineContext::new(item);
        ctx.record("fetch", ctx.item.id.clone());

        // Classify
        let verdict = self.classifier.classify(&ctx.item).await?;
        ctx.record("classify", verdict.to_string());
        if !verdict.is_positive() {
            info!(id = %ctx.item.id, verdict = %verdict, "Item filtered");
            return Ok(TriageRun {
                outcome: TriageOutcome::Filtered { verdict },
                context: Some(ctx),
            });
        }

        // Summarize
        let prompt = build_summary_prompt(&ctx.item, self.max_content_chars);
        let summary = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::Completion {
                stage: "summarize",
                source: e,
            })?;
        ctx.record("summarize", summary.clone());

        // Notify — delivery failure is reported, not fatal.
        let (title, body) = build_notification(&ctx.item, &summary);
        let delivered = match self.sink.send(&title, &body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    id = %ctx.item.id,
                    sink = self.sink.name(),
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        };
        ctx.record("notify", if delivered { "delivered" } else { "failed" });
        info!(id = %ctx.item.id, delivered, "Triage run complete");

        Ok(TriageRun {
            outcome: TriageOutcome::Notified {
                verdict,
                summary,
                delivered,
            },
            context: Some(ctx),
        })
    }
}

/// Summarization prompt, bounded by the same content-length policy as the
/// classifier's fallback tier.
fn build_summary_prompt(item: &Item, max_content_chars: usize) -> String {
    let body: String = item.body.chars().take(max_content_chars).collect();
    format!("Summarize this email:\n\n{body}")
}

/// Format the (sender, subject, summary, permalink) tuple for the sink.
fn build_notification(item: &Item, summary: &str) -> (String, String) {
    let mut body = format!(
        "*From:* {}\n*Subject:* {}\n*Summary:* {}",
        item.sender.as_deref().unwrap_or("(unknown)"),
        item.subject.as_deref().unwrap_or("(no subject)"),
        summary,
    );
    if let Some(ref link) = item.permalink {
        body.push_str(&format!("\n[View Email]({link})"));
    }
    ("You've received a work email!".to_string(), body)
}
