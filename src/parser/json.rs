//! JSON documents, pretty-printed so the splitter sees one field per line.

use anyhow::Result;
use tracing::debug;

use super::{DocumentParser, ParseOptions};
use crate::document::DocumentInfo;

pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn supported_types(&self) -> &[&str] {
        &["json"]
    }

    fn load(&self, bytes: &[u8], _options: &ParseOptions) -> Result<DocumentInfo> {
        let raw = String::from_utf8_lossy(bytes);
        let text = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => serde_json::to_string_pretty(&value)?,
            Err(e) => {
                debug!(error = %e, "input is not valid JSON, keeping raw text");
                raw.into_owned()
            }
        };
        Ok(DocumentInfo::text(text, false))
    }
}
