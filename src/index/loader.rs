//! Reference corpus loading.
//!
//! Reads .md/.txt files under the corpus directory and splits each into
//! blank-line-separated passages. A missing or empty directory yields an
//! empty corpus with a warning — the pipelines then run without retrieval
//! context.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::IndexError;

/// Passages shorter than this are noise (stray headings, separators).
const MIN_PASSAGE_CHARS: usize = 8;

/// Load all corpus passages from `dir`.
pub async fn load_corpus(dir: &Path) -> Result<Vec<String>, IndexError> {
    if !dir.exists() {
        warn!(dir = %dir.display(), "Corpus directory not found — continuing without reference context");
        return Ok(Vec::new());
    }

    let mut passages = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !entry.metadata().await?.is_file() {
            continue;
        }
        if !matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md" | "txt")
        ) {
            continue;
        }
        let content = fs::read_to_string(&path).await?;
        let count_before = passages.len();
        passages.extend(split_passages(&content));
        debug!(
            file = %path.display(),
            passages = passages.len() - count_before,
            "Loaded corpus file"
        );
    }

    if passages.is_empty() {
        warn!(dir = %dir.display(), "No corpus passages found — continuing without reference context");
    }
    Ok(passages)
}

/// Split a document into passages on blank lines.
fn split_passages(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.chars().count() >= MIN_PASSAGE_CHARS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_directory_yields_empty_corpus() {
        let passages = load_corpus(Path::new("/definitely/not/here")).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn loads_md_and_txt_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("notes.md"),
            "First passage about invoices.\n\nSecond passage about meetings.",
        )
        .unwrap();
        std::fs::write(dir.path().join("more.txt"), "A third passage here.").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary-ish").unwrap();

        let mut passages = load_corpus(dir.path()).await.unwrap();
        passages.sort();
        assert_eq!(passages.len(), 3);
        assert!(passages.iter().any(|p| p.contains("invoices")));
        assert!(passages.iter().any(|p| p.contains("meetings")));
        assert!(passages.iter().any(|p| p.contains("third")));
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_corpus() {
        let dir = TempDir::new().unwrap();
        let passages = load_corpus(dir.path()).await.unwrap();
        assert!(passages.is_empty());
    }

    #[test]
    fn split_drops_short_fragments() {
        let passages = split_passages("# A\n\nA real passage with content.\n\n---\n\n");
        assert_eq!(passages.len(), 1);
        assert!(passages[0].contains("real passage"));
    }

    #[test]
    fn split_trims_whitespace() {
        let passages = split_passages("  padded passage text  \n\nanother passage");
        assert_eq!(passages[0], "padded passage text");
        assert_eq!(passages[1], "another passage");
    }
}
