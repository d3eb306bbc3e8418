//! Layout post-processing.
//!
//! Takes the structured result of a layout analysis and turns it into clean
//! paged markdown:
//!
//! 1. [`table_merge`] finds tables that were split by a page break and
//!    [`table_content`] renders each run of fragments as one table.
//! 2. [`splice`] rewrites the content with the merged tables and cuts it into
//!    pages.
//! 3. [`figures`] downloads figure images, saves one file per distinct image
//!    and [`anchor`] drops an image reference where the figure was.
//!
//! ```no_run
//! use rag_ready::layout::{AnalyzeResult, LayoutPostProcessor, LayoutSettings};
//!
//! let bytes = std::fs::read("result.json")?;
//! let result = AnalyzeResult::from_json(&bytes)?;
//! let output = LayoutPostProcessor::new(LayoutSettings::default()).process(&result, None);
//! for page in &output.pages {
//!     println!("page {}: {} chars", page.page_number, page.content.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod anchor;
pub mod fetch;
pub mod figures;
pub mod image_hash;
pub mod model;
pub mod splice;
pub mod table_content;
pub mod table_merge;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use fetch::{DocumentIntelligenceClient, FigureSource};
pub use figures::{ExtractedFigure, FigureExtractor, ImageHashRegistry};
pub use model::{AnalyzeResult, ContentBuffer, Page, PAGE_BREAK};
pub use table_merge::{MergeKind, MergedTableGroup, TableMergeAnalyzer};

/// Errors surfaced by layout post-processing.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("invalid endpoint {endpoint:?}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },

    #[error("endpoint {0:?} must use http or https")]
    UnsupportedScheme(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("figure {id} returned HTTP {status}")]
    FigureStatus { id: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Tunable thresholds and service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Tables whose top edge sits above this fraction of the page height may
    /// be banners.
    pub banner_top_ratio: f64,
    pub banner_max_rows: usize,
    pub banner_max_columns: usize,
    /// The first half of a horizontal split must reach past this fraction of
    /// the page width.
    pub right_cover_ratio: f64,
    /// The second half must start before this fraction of the page width.
    pub left_cover_ratio: f64,
    /// Largest fingerprint distance still treated as the same image.
    pub dedup_threshold: usize,
    pub hash_size: u32,
    pub fetch_retries: u32,
    pub fetch_timeout_secs: u64,
    pub api_version: String,
    pub model_id: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            banner_top_ratio: 0.2,
            banner_max_rows: 2,
            banner_max_columns: 6,
            right_cover_ratio: 0.99,
            left_cover_ratio: 0.01,
            dedup_threshold: 5,
            hash_size: 8,
            fetch_retries: 3,
            fetch_timeout_secs: 60,
            api_version: "2024-11-30".to_string(),
            model_id: "prebuilt-layout".to_string(),
        }
    }
}

/// Where extracted figures come from and where they go.
#[derive(Clone, Copy)]
pub struct FigureJob<'a> {
    pub source: &'a dyn FigureSource,
    pub output_dir: &'a Path,
}

/// Result of post-processing one document.
#[derive(Debug, Clone, Default)]
pub struct LayoutOutput {
    /// Content with merged tables, before paging and figure tags.
    pub content: String,
    pub pages: Vec<Page>,
    pub merged_groups: Vec<MergedTableGroup>,
    pub figures: Vec<ExtractedFigure>,
}

/// Entry point for layout post-processing of one document at a time.
#[derive(Debug, Clone, Default)]
pub struct LayoutPostProcessor {
    settings: LayoutSettings,
}

impl LayoutPostProcessor {
    #[must_use]
    pub fn new(settings: LayoutSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    /// Merge split tables and return the rewritten content with the groups.
    #[must_use]
    pub fn merge_tables(&self, result: &AnalyzeResult) -> (String, Vec<MergedTableGroup>) {
        let buffer = ContentBuffer::new(&result.content);
        let groups = TableMergeAnalyzer::new(result, &buffer, &self.settings).merge_groups();
        for group in &groups {
            debug!(tables = ?group.table_indices, "merged table fragments");
        }
        (splice::splice(&buffer, &groups), groups)
    }

    /// Merge tables, page the content and, with a [`FigureJob`], extract and
    /// anchor figures.
    ///
    /// Figure problems never fail the document: without an images directory
    /// the output is text only.
    #[must_use]
    pub fn process(&self, result: &AnalyzeResult, figures: Option<FigureJob<'_>>) -> LayoutOutput {
        let (content, merged_groups) = self.merge_tables(result);
        let mut pages = splice::split_pages(&content);
        info!(
            tables = result.tables.len(),
            merged = merged_groups.len(),
            pages = pages.len(),
            "layout tables processed"
        );

        let figures = match figures {
            Some(job) => self.extract_figures(result, job, &mut pages),
            None => Vec::new(),
        };

        LayoutOutput {
            content,
            pages,
            merged_groups,
            figures,
        }
    }

    /// Parse a saved result and [`process`](Self::process) it.
    pub fn process_json(&self, bytes: &[u8], figures: Option<FigureJob<'_>>) -> Result<LayoutOutput> {
        let result = AnalyzeResult::from_json(bytes)?;
        Ok(self.process(&result, figures))
    }

    fn extract_figures(
        &self,
        result: &AnalyzeResult,
        job: FigureJob<'_>,
        pages: &mut [Page],
    ) -> Vec<ExtractedFigure> {
        if result.figures.as_ref().is_none_or(Vec::is_empty) {
            debug!("no figures to extract");
            return Vec::new();
        }
        let extractor = match FigureExtractor::new(&self.settings, job.source, job.output_dir) {
            Ok(extractor) => extractor,
            Err(e) => {
                warn!(error = %e, dir = %job.output_dir.display(), "cannot prepare images directory");
                return Vec::new();
            }
        };
        let buffer = ContentBuffer::new(&result.content);
        extractor.extract_all(result, &buffer, pages)
    }
}
