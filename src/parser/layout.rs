//! Saved layout-analysis results.
//!
//! The input is the JSON result of a layout analysis. Split tables are merged,
//! the content is cut into pages and, when credentials, a result id and an
//! output directory are all available, figure images are downloaded and
//! referenced from the pages.

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{DocumentParser, ParseOptions, LAYOUT_EXTRACTOR};
use crate::document::{DocumentInfo, DocumentPage};
use crate::layout::{
    AnalyzeResult, DocumentIntelligenceClient, FigureJob, LayoutOutput, LayoutPostProcessor,
};

pub struct LayoutParser;

impl LayoutParser {
    fn run(result: &AnalyzeResult, options: &ParseOptions) -> LayoutOutput {
        let processor = LayoutPostProcessor::new(options.layout.clone());
        if !options.figures {
            return processor.process(result, None);
        }

        let (Some(di), Some(result_id), Some(output_dir)) = (
            options.di.as_ref(),
            options.result_id.as_deref(),
            options.output_dir.as_deref(),
        ) else {
            info!("figure extraction needs credentials, a result id and an output directory; skipping");
            return processor.process(result, None);
        };

        let client = match DocumentIntelligenceClient::new(di, result_id, &options.layout) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "cannot build figure client, keeping text only");
                return processor.process(result, None);
            }
        };
        let job = FigureJob {
            source: &client,
            output_dir,
        };
        processor.process(result, Some(job))
    }
}

impl DocumentParser for LayoutParser {
    fn supported_types(&self) -> &[&str] {
        &[LAYOUT_EXTRACTOR]
    }

    fn load(&self, bytes: &[u8], options: &ParseOptions) -> Result<DocumentInfo> {
        let result = AnalyzeResult::from_json(bytes).context("input is not a layout analysis result")?;
        let output = Self::run(&result, options);

        Ok(DocumentInfo {
            content: output.content,
            pages: output
                .pages
                .into_iter()
                .map(|p| DocumentPage {
                    content: p.content,
                    page: p.page_number,
                })
                .collect(),
            use_splitter: false,
            is_markdown: true,
        })
    }
}
