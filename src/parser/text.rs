//! Plain text and markdown.

use anyhow::Result;

use super::{DocumentParser, ParseOptions};
use crate::document::DocumentInfo;

/// Decodes bytes as UTF-8, replacing invalid sequences.
pub struct TextParser {
    markdown: bool,
}

impl TextParser {
    #[must_use]
    pub fn plain() -> Self {
        Self { markdown: false }
    }

    #[must_use]
    pub fn markdown() -> Self {
        Self { markdown: true }
    }
}

impl DocumentParser for TextParser {
    fn supported_types(&self) -> &[&str] {
        if self.markdown {
            &["md", "markdown"]
        } else {
            &["txt", "text"]
        }
    }

    fn load(&self, bytes: &[u8], _options: &ParseOptions) -> Result<DocumentInfo> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(DocumentInfo::text(text, self.markdown))
    }
}
