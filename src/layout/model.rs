//! Layout-extraction result model.
//!
//! Mirrors the JSON returned by the layout-analysis service: one shared
//! `content` buffer plus paragraphs, tables and figures that point back into
//! it through [`Span`]s. Offsets are Unicode code-point indices, so slicing
//! goes through [`ContentBuffer`] rather than raw byte ranges.

use serde::{Deserialize, Serialize};

/// Marker the service emits between pages of the markdown content.
pub const PAGE_BREAK: &str = "<!-- PageBreak -->";

/// A character range into the shared content buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    #[must_use]
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Location of an element on a page.
///
/// `polygon` is a flat coordinate list: top-left, top-right, bottom-right,
/// bottom-left, each as an `(x, y)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub page_number: u32,
    #[serde(default)]
    pub polygon: Vec<f64>,
}

/// Page geometry reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub page_number: u32,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Semantic role of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParagraphRole {
    PageHeader,
    PageFooter,
    PageNumber,
    Title,
    SectionHeading,
    Footnote,
    FormulaBlock,
    #[serde(other)]
    Other,
}

impl ParagraphRole {
    /// Page furniture repeats on every page and never counts as body text.
    #[must_use]
    pub fn is_page_furniture(self) -> bool {
        matches!(
            self,
            ParagraphRole::PageHeader | ParagraphRole::PageFooter | ParagraphRole::PageNumber
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ParagraphRole>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// Role of a table cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellKind {
    #[default]
    Content,
    RowHeader,
    ColumnHeader,
    StubHead,
    Description,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    #[serde(default)]
    pub kind: CellKind,
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<TableCell>,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl Table {
    /// Smallest page number among the table's bounding regions.
    #[must_use]
    pub fn first_page(&self) -> Option<u32> {
        self.bounding_regions.iter().map(|r| r.page_number).min()
    }

    /// Normalized column-header texts ordered by `(row, column)`.
    #[must_use]
    pub fn header_texts(&self) -> Vec<String> {
        let mut headers: Vec<&TableCell> = self
            .cells
            .iter()
            .filter(|c| c.kind == CellKind::ColumnHeader)
            .collect();
        headers.sort_by_key(|c| (c.row_index, c.column_index));
        headers
            .into_iter()
            .map(|c| normalize_cell_text(&c.content))
            .collect()
    }
}

/// Collapse whitespace and lowercase, so header comparison ignores layout noise.
#[must_use]
pub fn normalize_cell_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Figure {
    /// `"<page>.<n>"`, assigned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Caption>,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
}

/// The structured result of one layout analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Vec<ResultPage>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figures: Option<Vec<Figure>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultEnvelope {
    Wrapped {
        #[serde(rename = "analyzeResult")]
        analyze_result: AnalyzeResult,
    },
    Bare(AnalyzeResult),
}

impl AnalyzeResult {
    /// Parse a saved result, either bare or wrapped in the service's
    /// `{"status": ..., "analyzeResult": {...}}` envelope.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let envelope: ResultEnvelope = serde_json::from_slice(bytes)?;
        Ok(match envelope {
            ResultEnvelope::Wrapped { analyze_result } => analyze_result,
            ResultEnvelope::Bare(result) => result,
        })
    }

    /// Geometry of the page with the given 1-based number.
    #[must_use]
    pub fn page(&self, page_number: u32) -> Option<&ResultPage> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }
}

/// One page of restructured text, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub content: String,
}

/// Code-point indexed view over the content buffer.
///
/// Slicing clamps out-of-range bounds and yields an empty string for
/// inverted ranges, so malformed spans never panic.
#[derive(Debug, Clone)]
pub struct ContentBuffer<'a> {
    text: &'a str,
    /// Byte offset of every char boundary, including the end of the text.
    boundaries: Vec<usize>,
}

impl<'a> ContentBuffer<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Length in code points.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Text between two code-point offsets.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.min(len);
        if start >= end {
            return "";
        }
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    /// Text covered by a span.
    #[must_use]
    pub fn span_text(&self, span: Span) -> &'a str {
        self.slice(span.offset, span.end())
    }
}
