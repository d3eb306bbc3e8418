//! `rag-ready` - document preprocessing for retrieval pipelines
//!
//! # Features
//!
//! - **Layout post-processing**: merges tables split across pages, pages the
//!   markdown, deduplicates and anchors figure images
//! - **Parsers**: plain text, markdown, JSON and saved layout-analysis results
//! - **Chunking**: recursive character splitting with overlap
//! - **Pipeline**: file info, parse, cut, write `segments.json` / `segments.md`
//!
//! # Example
//!
//! ```rust,no_run
//! use rag_ready::pipeline::{Pipeline, PipelineConfig, PipelineContext};
//!
//! let mut ctx = PipelineContext::new("report.md", "out", PipelineConfig::default());
//! assert!(Pipeline::new().run(&mut ctx));
//! println!("{} segments", ctx.chunks.len());
//! ```

pub mod chunk;
pub mod config;
pub mod document;
pub mod layout;
pub mod parser;
pub mod pipeline;

pub use chunk::{RecursiveCharacterSplitter, SplitterRegistry, TextSplitter};
pub use config::{AppConfig, DocumentIntelligenceConfig};
pub use document::{DocumentChunk, DocumentInfo, DocumentPage, FileInfo};
pub use layout::{AnalyzeResult, LayoutError, LayoutOutput, LayoutPostProcessor, LayoutSettings};
pub use parser::{DocumentParser, ParseOptions, ParserRegistry};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineStep};

/// Version of rag-ready
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
