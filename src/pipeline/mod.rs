//! Sequential preprocessing pipeline.
//!
//! A fixed list of [`PipelineStep`]s runs against one shared
//! [`PipelineContext`]: file info, parsing, cutting into chunks, then writing
//! `segments.json` and `segments.md`. The first failing step stops the run.

pub mod steps;

use std::path::PathBuf;

use tracing::{error, info};

use crate::config::DocumentIntelligenceConfig;
use crate::document::{DocumentChunk, DocumentInfo, FileInfo};
use crate::layout::LayoutSettings;

pub use steps::{CutDocument, InputFileInfo, ParseDocument, WriteOutputFiles};

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Parser label; the input extension when `None`.
    pub parser: Option<String>,
    pub extractor: Option<String>,
    pub splitter: Option<String>,
    pub result_id: Option<String>,
    pub figures: bool,
    pub di: Option<DocumentIntelligenceConfig>,
    pub layout: LayoutSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            overlap: 0,
            parser: None,
            extractor: None,
            splitter: None,
            result_id: None,
            figures: true,
            di: None,
            layout: LayoutSettings::default(),
        }
    }
}

/// State threaded through the steps.
#[derive(Debug)]
pub struct PipelineContext {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
    pub success: bool,
    pub should_continue: bool,
    pub current_step: Option<&'static str>,
    pub file_info: Option<FileInfo>,
    pub document: Option<DocumentInfo>,
    pub chunks: Vec<DocumentChunk>,
}

impl PipelineContext {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            config,
            success: true,
            should_continue: true,
            current_step: None,
            file_info: None,
            document: None,
            chunks: Vec::new(),
        }
    }
}

/// One stage of the pipeline.
pub trait PipelineStep {
    fn name(&self) -> &'static str;

    fn execute(&self, ctx: &mut PipelineContext) -> anyhow::Result<()>;
}

/// Runs steps in order until one fails or asks to stop.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// The standard step list.
    pub fn new() -> Self {
        Self::with_steps(vec![
            Box::new(InputFileInfo),
            Box::new(ParseDocument),
            Box::new(CutDocument),
            Box::new(WriteOutputFiles),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn PipelineStep>>) -> Self {
        Self { steps }
    }

    /// Run all steps; returns `ctx.success`.
    pub fn run(&self, ctx: &mut PipelineContext) -> bool {
        for step in &self.steps {
            ctx.current_step = Some(step.name());
            if let Err(e) = step.execute(ctx) {
                error!(step = step.name(), error = %format!("{e:#}"), "step failed");
                ctx.success = false;
            }
            ctx.current_step = None;
            if !ctx.success || !ctx.should_continue {
                break;
            }
        }
        info!(success = ctx.success, "pipeline done");
        ctx.success
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
