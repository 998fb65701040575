//! Trusted-sender allowlist.
//!
//! One sender per line; `#` comments and blank lines are skipped. Matching
//! is case-insensitive. Loaded once at startup and read-only afterwards.

use std::collections::HashSet;
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// Set of known-trusted sender identifiers.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    senders: HashSet<String>,
}

impl Allowlist {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an iterator of senders (normalized to lowercase).
    pub fn from_senders<I, S>(senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            senders: senders
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Load from a file. A missing file yields an empty allowlist with a
    /// warning — classification then relies on the similarity and model
    /// tiers alone.
    pub async fn load(path: &Path) -> Self {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let list = Self::from_senders(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#')),
                );
                debug!(
                    path = %path.display(),
                    senders = list.len(),
                    "Loaded sender allowlist"
                );
                list
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Allowlist file not readable — using similarity + model tiers only"
                );
                Self::empty()
            }
        }
    }

    /// O(1) membership check, case-insensitive.
    pub fn contains(&self, sender: &str) -> bool {
        self.senders.contains(&sender.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
