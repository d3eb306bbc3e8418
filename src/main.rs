//! `rag-ready` CLI - turn one document into retrieval-ready segments

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rag_ready::{AppConfig, DocumentIntelligenceConfig, Pipeline, PipelineConfig, PipelineContext};

#[derive(Parser)]
#[command(name = "rag-ready")]
#[command(about = "Parse, restructure and chunk a document for RAG ingestion")]
#[command(version)]
struct Cli {
    /// Input file
    #[arg(short, long)]
    file: PathBuf,

    /// Directory for segments.json, segments.md and images/
    #[arg(short, long, default_value = "./out")]
    output_dir: PathBuf,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1024")]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value = "0")]
    overlap: usize,

    /// Parser label (txt, md, json); defaults to the file extension
    #[arg(long)]
    parser: Option<String>,

    /// Extractor; `layout` treats the input as a saved layout-analysis result
    #[arg(long)]
    extractor: Option<String>,

    /// Splitter name
    #[arg(long)]
    splitter: Option<String>,

    /// Analysis result id, needed to download figure images
    #[arg(long)]
    result_id: Option<String>,

    /// Skip figure extraction
    #[arg(long)]
    no_figures: bool,

    /// Layout service endpoint (or AZURE_DI_ENDPOINT)
    #[arg(long)]
    azure_di_endpoint: Option<String>,

    /// Layout service key (or AZURE_DI_KEY)
    #[arg(long)]
    azure_di_key: Option<String>,

    /// Ignore proxy environment variables
    #[arg(long)]
    no_proxy: bool,

    /// Settings file (default: ~/.config/rag-ready/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    if !cli.file.is_file() {
        bail!("input file not found: {}", cli.file.display());
    }
    let app = AppConfig::load(cli.config.as_deref())?;

    let wants_layout = cli
        .extractor
        .as_deref()
        .is_some_and(|e| e.eq_ignore_ascii_case(rag_ready::parser::LAYOUT_EXTRACTOR));
    let figures = wants_layout && !cli.no_figures;

    // Credentials are only needed to download figures, and are checked before
    // any request goes out.
    let di = if figures && cli.result_id.is_some() {
        Some(
            DocumentIntelligenceConfig::resolve(
                cli.azure_di_endpoint.as_deref(),
                cli.azure_di_key.as_deref(),
                cli.no_proxy,
            )
            .context("layout service configuration")?,
        )
    } else {
        None
    };

    let config = PipelineConfig {
        chunk_size: cli.chunk_size,
        overlap: cli.overlap,
        parser: cli.parser,
        extractor: cli.extractor,
        splitter: cli.splitter,
        result_id: cli.result_id,
        figures,
        di,
        layout: app.layout,
    };

    info!(file = %cli.file.display(), output = %cli.output_dir.display(), "processing");
    let mut ctx = PipelineContext::new(cli.file, cli.output_dir, config);
    Ok(Pipeline::new().run(&mut ctx))
}
