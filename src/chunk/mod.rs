//! Text splitting into retrieval-sized chunks.

pub mod recursive;

use anyhow::Result;

pub use recursive::RecursiveCharacterSplitter;

/// Splits text into chunks.
pub trait TextSplitter: Send + Sync {
    fn split_text(&self, text: &str) -> Vec<String>;
}

/// Labels with a registered splitter. All of them use the recursive
/// character splitter today.
const KNOWN_LABELS: &[&str] = &["default", "md", "txt", "json", "html", "htm", "doc", "docx"];

/// Picks a splitter by file type, then by splitter name.
#[derive(Debug, Clone, Copy)]
pub struct SplitterRegistry {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SplitterRegistry {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Whether `label` has a dedicated entry.
    #[must_use]
    pub fn is_known(label: &str) -> bool {
        KNOWN_LABELS.contains(&label)
    }

    pub fn resolve(&self, name: &str, file_type: &str) -> Result<Box<dyn TextSplitter>> {
        let label = if Self::is_known(file_type) {
            file_type
        } else if Self::is_known(name) {
            name
        } else {
            "default"
        };
        tracing::debug!(label, "text splitter selected");
        Ok(Box::new(RecursiveCharacterSplitter::new(
            self.chunk_size,
            self.chunk_overlap,
        )?))
    }
}
