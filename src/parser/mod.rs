//! File-type aware document parsing.
//!
//! Each parser implements [`DocumentParser`] and turns raw input bytes into a
//! [`DocumentInfo`]. The [`ParserRegistry`] picks one by file-type label, or
//! by extractor name when an extractor is requested.
//!
//! | Label | Parser |
//! |-------|--------|
//! | `txt` | [`TextParser`] |
//! | `md`, `markdown` | [`TextParser`] (markdown) |
//! | `json` | [`JsonParser`] |
//! | extractor `layout` | [`LayoutParser`] |
//!
//! ```rust
//! use rag_ready::parser::{ParseOptions, ParserRegistry};
//!
//! let registry = ParserRegistry::new();
//! let doc = registry
//!     .resolve("md", None)
//!     .load(b"# Title", &ParseOptions::default())
//!     .unwrap();
//! assert!(doc.is_markdown);
//! ```

pub mod json;
pub mod layout;
pub mod text;

use std::path::PathBuf;

use anyhow::Result;

use crate::config::DocumentIntelligenceConfig;
use crate::document::DocumentInfo;
use crate::layout::LayoutSettings;

pub use json::JsonParser;
pub use layout::LayoutParser;
pub use text::TextParser;

/// Extractor name that selects [`LayoutParser`].
pub const LAYOUT_EXTRACTOR: &str = "layout";

/// Everything a parser may need besides the bytes.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub output_dir: Option<PathBuf>,
    /// Identifier of the analysis run the input came from; needed for figures.
    pub result_id: Option<String>,
    pub figures: bool,
    pub di: Option<DocumentIntelligenceConfig>,
    pub layout: LayoutSettings,
}

/// Converts input bytes into a document.
pub trait DocumentParser: Send + Sync {
    /// File-type labels this parser answers to.
    fn supported_types(&self) -> &[&str];

    fn load(&self, bytes: &[u8], options: &ParseOptions) -> Result<DocumentInfo>;
}

/// Lookup of parsers by label, falling back to plain text.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
    layout: LayoutParser,
    fallback: TextParser,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(TextParser::plain()),
                Box::new(TextParser::markdown()),
                Box::new(JsonParser),
            ],
            layout: LayoutParser,
            fallback: TextParser::plain(),
        }
    }

    /// Parser for `file_type`, or the extractor's parser when one is named.
    pub fn resolve(&self, file_type: &str, extractor: Option<&str>) -> &dyn DocumentParser {
        if extractor.is_some_and(|e| e.eq_ignore_ascii_case(LAYOUT_EXTRACTOR)) {
            return &self.layout;
        }
        let label = file_type.trim().to_lowercase();
        self.parsers
            .iter()
            .find(|p| p.supported_types().contains(&label.as_str()))
            .map_or(&self.fallback as &dyn DocumentParser, |p| p.as_ref())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
