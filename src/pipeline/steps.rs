//! The standard pipeline steps.

use std::fmt::Write as _;
use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;

use super::{PipelineContext, PipelineStep};
use crate::chunk::SplitterRegistry;
use crate::document::{DocumentChunk, FileInfo};
use crate::parser::{ParseOptions, ParserRegistry};

pub const SEGMENTS_JSON: &str = "segments.json";
pub const SEGMENTS_MD: &str = "segments.md";

/// Records the input file's extension.
pub struct InputFileInfo;

impl PipelineStep for InputFileInfo {
    fn name(&self) -> &'static str {
        "InputFileInfo"
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        ctx.file_info = Some(FileInfo::from_path(&ctx.input_path));
        Ok(())
    }
}

/// Reads the input and runs the selected parser.
pub struct ParseDocument;

impl PipelineStep for ParseDocument {
    fn name(&self) -> &'static str {
        "ParseDocument"
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let Some(file_info) = ctx.file_info.as_ref() else {
            bail!("file info missing");
        };
        let bytes = fs::read(&ctx.input_path)
            .with_context(|| format!("failed to read {}", ctx.input_path.display()))?;

        let config = &ctx.config;
        let label = config
            .parser
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(Some(file_info.extension.as_str()).filter(|e| !e.is_empty()))
            .unwrap_or("txt");
        let options = ParseOptions {
            output_dir: Some(ctx.output_dir.clone()),
            result_id: config.result_id.clone(),
            figures: config.figures,
            di: config.di.clone(),
            layout: config.layout.clone(),
        };

        let registry = ParserRegistry::new();
        let document = registry
            .resolve(label, config.extractor.as_deref())
            .load(&bytes, &options)?;
        info!(
            parser = label,
            use_splitter = document.use_splitter,
            pages = document.pages.len(),
            "document parsed"
        );
        ctx.document = Some(document);
        Ok(())
    }
}

/// Turns the document into chunks: split text, or one chunk per page.
pub struct CutDocument;

impl PipelineStep for CutDocument {
    fn name(&self) -> &'static str {
        "CutDocument"
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let (Some(file_info), Some(document)) = (ctx.file_info.as_ref(), ctx.document.as_ref()) else {
            bail!("document missing");
        };

        let chunks: Vec<DocumentChunk> = if document.use_splitter {
            let splitter = SplitterRegistry::new(ctx.config.chunk_size, ctx.config.overlap)
                .resolve(ctx.config.splitter.as_deref().unwrap_or("default"), &file_info.extension)?;
            splitter
                .split_text(&document.content)
                .into_iter()
                .enumerate()
                .map(|(i, text)| DocumentChunk::new(text, "part", i))
                .collect()
        } else {
            document
                .pages
                .iter()
                .map(|p| DocumentChunk::new(p.content.clone(), "page", p.page))
                .collect()
        };

        info!(segments = chunks.len(), "segments ready");
        ctx.chunks = chunks;
        Ok(())
    }
}

/// Writes `segments.json` and `segments.md` into the output directory.
pub struct WriteOutputFiles;

impl PipelineStep for WriteOutputFiles {
    fn name(&self) -> &'static str {
        "WriteOutputFiles"
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        if ctx.chunks.is_empty() {
            bail!("no segments to write");
        }
        fs::create_dir_all(&ctx.output_dir)
            .with_context(|| format!("failed to create {}", ctx.output_dir.display()))?;

        let json_path = ctx.output_dir.join(SEGMENTS_JSON);
        let json = serde_json::to_string_pretty(&ctx.chunks)?;
        fs::write(&json_path, json).with_context(|| format!("failed to write {}", json_path.display()))?;

        let md_path = ctx.output_dir.join(SEGMENTS_MD);
        fs::write(&md_path, segments_markdown(&ctx.chunks))
            .with_context(|| format!("failed to write {}", md_path.display()))?;

        info!(segments = ctx.chunks.len(), dir = %ctx.output_dir.display(), "segments written");
        Ok(())
    }
}

/// Render chunks grouped by their `page` metadata, in page order.
///
/// Chunks without a page number land on page 1.
pub fn segments_markdown(chunks: &[DocumentChunk]) -> String {
    let mut pages: std::collections::BTreeMap<u32, Vec<&DocumentChunk>> = std::collections::BTreeMap::new();
    for chunk in chunks {
        pages.entry(chunk.page().unwrap_or(1)).or_default().push(chunk);
    }

    let mut out = String::new();
    for (page, chunks) in pages {
        let _ = write!(out, "<!-- PageNumber=\"{page}\" -->\n\n## Page {page}\n\n");
        for chunk in chunks {
            let text = chunk.text.trim_end();
            if !text.is_empty() {
                out.push_str(text);
                out.push_str("\n\n");
            }
        }
        out.push_str("<!-- PageBreak -->\n\n");
    }
    out
}
