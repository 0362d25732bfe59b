use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use concordance::error::EXIT_INVALID_INPUT;
use concordance::{ConcordanceError, Destination, IndexerConfig, JsonStyle, Pipeline, RunReport};

/// Index keyword occurrences in a text file and write a JSON concordance.
#[derive(Debug, Parser)]
#[command(name = "concordance", version)]
struct Cli {
    /// Text file to scan.
    input: PathBuf,

    /// Report path, or `-` for stdout.
    output: PathBuf,

    /// Keywords to index (case-insensitive).
    #[arg(required = true, num_args = 1..)]
    keywords: Vec<String>,

    /// Words of context captured on each side of a match.
    #[arg(short = 'k', long)]
    context_words: Option<usize>,

    /// Lines longer than this many bytes are skipped.
    #[arg(long)]
    max_line_bytes: Option<usize>,

    /// Refuse input files larger than this many bytes.
    #[arg(long)]
    max_file_bytes: Option<u64>,

    /// Worker threads used for matching.
    #[arg(short = 'j', long)]
    jobs: Option<NonZeroUsize>,

    /// Write single-line JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_INVALID_INPUT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing();

    match run(&cli) {
        Ok(report) => {
            info!(
                "indexed {} keywords: {} matches across {} lines ({} skipped, {} bytes) in {} ms",
                report.keywords,
                report.summary.matches,
                report.summary.lines_read,
                report.summary.lines_skipped,
                report.bytes_read,
                report.elapsed.as_millis()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<ConcordanceError>()
                .map_or(EXIT_INVALID_INPUT, ConcordanceError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = load_config(cli);
    let destination = Destination::from(cli.output.clone());
    info!("indexing {}", cli.input.display());

    let mut pipeline = Pipeline::new(config);
    debug!("configuration: {:?}", pipeline.config());
    let report = pipeline
        .run(&cli.input, &cli.keywords, &destination)
        .with_context(|| format!("concordance of {} failed", cli.input.display()))?;
    if let Destination::File(path) = &destination {
        info!("report written to {}", path.display());
    }
    Ok(report)
}

/// Environment first, then command-line flags on top.
fn load_config(cli: &Cli) -> IndexerConfig {
    let mut config = IndexerConfig::from_env();
    if let Some(context_words) = cli.context_words {
        config.context_words = context_words;
    }
    if let Some(max_line_bytes) = cli.max_line_bytes {
        config.limits.max_line_bytes = max_line_bytes;
    }
    if let Some(max_file_bytes) = cli.max_file_bytes {
        config.limits.max_file_bytes = max_file_bytes;
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs.get();
    }
    if cli.compact {
        config.style = JsonStyle::Compact;
    }
    config
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
