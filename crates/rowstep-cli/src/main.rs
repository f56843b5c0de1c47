//! rowstep CLI: run, validate and describe YAML pipelines over CSV files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rowstep_core::config::EngineConfig;
use rowstep_core::context::Context;
use rowstep_core::filter::{Paging, PagingCursor, SortExprSet};
use rowstep_io::{CsvProvider, FrameDefinition, JsonlWriter};
use rowstep_model::{parse_yaml_pipeline, Model, ParsedPipeline, Providers};

#[derive(Parser)]
#[command(name = "rowstep")]
#[command(about = "Step-based row pipelines: load, join, group and page through CSV data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline and write one page of a datasource as JSON lines
    Run {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Datasource to load
        #[arg(short, long)]
        source: String,

        /// Page size (overrides config)
        #[arg(long)]
        page_size: Option<usize>,

        /// Sorting, e.g. "total DESC, name" or "-total,name"
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,

        /// Page cursor printed by a previous run
        #[arg(long)]
        cursor: Option<String>,

        /// Group step accumulation checkpoint (overrides config)
        #[arg(long)]
        batch_rows: Option<usize>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a pipeline: syntax, step structure and expressions
    Validate {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Print the column description of a datasource as JSON
    Describe {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Datasource to describe
        #[arg(short, long)]
        source: String,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let res = match cli.command {
        Commands::Run {
            pipeline,
            source,
            page_size,
            sort,
            cursor,
            batch_rows,
            output,
        } => run_pipeline(&pipeline, &source, page_size, sort, cursor, batch_rows, output),
        Commands::Validate { pipeline } => validate_pipeline(&pipeline).map(|_| {
            println!("✓ Pipeline is valid");
        }),
        Commands::Describe { pipeline, source } => describe_source(&pipeline, &source),
    };

    if let Err(e) = res {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn read_pipeline(path: &Path) -> CliResult<ParsedPipeline> {
    let yaml = fs::read_to_string(path)?;
    Ok(parse_yaml_pipeline(&yaml)?)
}

/// CSV load steps resolve relative paths against the pipeline's directory.
fn providers(pipeline: &Path) -> Providers {
    let root = pipeline.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut p = Providers::new();
    p.insert("csv".into(), Arc::new(CsvProvider::new().with_root(root)));
    p
}

fn build_model(ctx: &Context, path: &Path, config: impl FnOnce(EngineConfig) -> EngineConfig) -> CliResult<Model> {
    let parsed = read_pipeline(path)?;
    let cfg = config(parsed.config.apply(EngineConfig::from_env()));
    let mut model = Model::new(ctx, &providers(path), &parsed.steps)?.with_config(cfg);
    model.run(ctx)?;
    Ok(model)
}

fn run_pipeline(
    path: &Path,
    source: &str,
    page_size: Option<usize>,
    sort: Option<String>,
    cursor: Option<String>,
    batch_rows: Option<usize>,
    output: Option<PathBuf>,
) -> CliResult<()> {
    let ctx = Context::background();
    let model = build_model(&ctx, path, |mut cfg| {
        if let Some(n) = page_size {
            cfg.default_page_size = n;
        }
        if let Some(n) = batch_rows {
            cfg.aggregate_batch_rows = (n > 0).then_some(n);
        }
        cfg
    })?;

    let mut def = FrameDefinition::new(source);
    if let Some(s) = sort {
        def = def.with_sorting(SortExprSet::parse(&s)?);
    }
    let mut paging = Paging::with_limit(model.config().default_page_size);
    if let Some(token) = cursor {
        paging = paging.with_cursor(PagingCursor::decode(&token)?);
    }
    def = def.with_paging(paging);

    let frames = model.load(&ctx, &[def])?;
    let rows = match output {
        Some(out) => write_frames(JsonlWriter::to_path(out)?, &frames)?,
        None => write_frames(JsonlWriter::to_writer(io::stdout().lock()), &frames)?,
    };

    for frame in &frames {
        if let Some(next) = &frame.paging.next_page {
            eprintln!("next page: {}", next.0.encode()?);
        }
        if let Some(prev) = &frame.paging.prev_page {
            eprintln!("previous page: {}", prev.0.encode()?);
        }
    }
    tracing::info!(source, rows, "pipeline executed");
    Ok(())
}

fn write_frames<W: io::Write>(mut w: JsonlWriter<W>, frames: &[rowstep_io::Frame]) -> CliResult<usize> {
    for f in frames {
        w.write_frame(f)?;
    }
    let n = w.rows_written();
    w.into_inner()?;
    Ok(n)
}

fn validate_pipeline(path: &Path) -> CliResult<()> {
    let ctx = Context::background();
    let model = build_model(&ctx, path, |cfg| cfg)?;
    for name in model.datasource_names() {
        println!("  {name}");
    }
    Ok(())
}

fn describe_source(path: &Path, source: &str) -> CliResult<()> {
    let ctx = Context::background();
    let model = build_model(&ctx, path, |cfg| cfg)?;
    let descriptions = model.describe(source)?;
    println!("{}", serde_json::to_string_pretty(&descriptions)?);
    Ok(())
}
