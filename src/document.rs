//! Document model shared by parsers, splitters and output writing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What is known about the input file before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Lower-case extension without the dot; empty when there is none.
    pub extension: String,
}

impl FileInfo {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self { extension }
    }
}

/// One page of parsed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub content: String,
    pub page: u32,
}

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub content: String,
    pub pages: Vec<DocumentPage>,
    /// Run the text splitter over `content`; otherwise every page is a chunk.
    pub use_splitter: bool,
    pub is_markdown: bool,
}

impl DocumentInfo {
    /// Unpaged text destined for the splitter.
    #[must_use]
    pub fn text(content: String, is_markdown: bool) -> Self {
        Self {
            content,
            pages: Vec::new(),
            use_splitter: true,
            is_markdown,
        }
    }
}

/// One output segment with free-form metadata such as `{"page": 2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    #[must_use]
    pub fn new(text: impl Into<String>, key: &str, value: impl Into<Value>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(key.to_string(), value.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Page number from the metadata, if it holds one.
    #[must_use]
    pub fn page(&self) -> Option<u32> {
        match self.metadata.get("page")? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
