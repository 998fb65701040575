//! Per-run accumulator threaded through pipeline stages.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::channels::Item;

/// One stage's recorded output.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: &'static str,
    pub output: String,
    pub recorded_at: DateTime<Utc>,
}

/// Mutable accumulator owned by one orchestrator invocation.
///
/// Records are append-only: `record` pushes and `output_of` always returns
/// the first record for a stage, so a later record can never shadow an
/// earlier one. Discarded when the run completes or aborts.
#[derive(Debug)]
pub struct PipelineContext {
    pub run_id: Uuid,
    pub item: Item,
    records: Vec<StageRecord>,
}

impl PipelineContext {
    pub fn new(item: Item) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            item,
            records: Vec::new(),
        }
    }

    /// Append a stage's output.
    pub fn record(&mut self, stage: &'static str, output: impl Into<String>) {
        self.records.push(StageRecord {
            stage,
            output: output.into(),
            recorded_at: Utc::now(),
        });
    }

    /// Output of the first record for `stage`.
    pub fn output_of(&self, stage: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.output.as_str())
    }

    /// Stage names in execution order, for diagnostics.
    pub fn executed_stages(&self) -> Vec<&'static str> {
        self.records.iter().map(|r| r.stage).collect()
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }
}
