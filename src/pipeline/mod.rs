//! Pipeline orchestration.
//!
//! Two concrete pipelines share the same shape — named stages run in
//! sequence, each stage's artifact feeds the next, and terminal conditions
//! short-circuit the rest:
//!
//! - Triage: fetch → classify → summarize → notify
//! - Q&A: analyze → retrieve → answer → review
//!
//! Every run owns an independent `PipelineContext`; stage outputs are
//! append-only and discarded when the run ends.

pub mod context;
pub mod poller;
pub mod qa;
pub mod triage;

pub use context::{PipelineContext, StageRecord};
pub use poller::spawn_triage_poller;
pub use qa::{QaPipeline, QaRun, ReviewOutcome};
pub use triage::{TriageOutcome, TriagePipeline, TriageRun};
