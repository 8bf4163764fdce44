//! `tally`: instrument JavaScript files for coverage and turn registry dumps into reports.
use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use swc_tally_instrument::{instrument_source, InstrumentError, InstrumentLogOptions, InstrumentOptions};
use tally_oxide::{
    analyze, normalize_path, split_lines, AnalyzeConfig, PathFilter, PatternError, Registry,
    RegistrySnapshot, SourceLines,
};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace). Logging is off when unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log span enter and close events
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the instrumented code of a file
    Instrument {
        file: PathBuf,

        /// Global object the tracking calls go through
        #[arg(long, default_value = "__$$tally")]
        coverage_variable: String,

        /// Write the zeroed registry of the file to this path
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Print the coverage report of a registry dump
    Analyze {
        /// Registry snapshot written by the host at the end of a run
        #[arg(long)]
        registry: PathBuf,

        /// Only report files under this path
        #[arg(long, default_value = "")]
        root: String,

        /// Sub-path of the root left out of the report; repeatable
        #[arg(long)]
        exclude: Vec<String>,

        /// Report file names relative to this directory
        #[arg(long)]
        base_dir: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid registry dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

fn io_error(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn initialize_instrumentation_log(log_options: &InstrumentLogOptions) {
    let log_level = match log_options.level.as_deref() {
        Some("error") => Some(tracing::Level::ERROR),
        Some("debug") => Some(tracing::Level::DEBUG),
        Some("info") => Some(tracing::Level::INFO),
        Some("warn") => Some(tracing::Level::WARN),
        Some("trace") => Some(tracing::Level::TRACE),
        _ => None,
    };

    if let Some(log_level) = log_level {
        let builder = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr);

        let builder = if log_options.enable_trace {
            builder.with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        } else {
            builder
        };

        builder
            .with_ansi(false)
            .event_format(tracing_subscriber::fmt::format().pretty())
            .init();
    }
}

fn run_instrument(
    file: PathBuf,
    options: InstrumentOptions,
    schema: Option<PathBuf>,
) -> Result<(), CliError> {
    let source = fs::read_to_string(&file).map_err(io_error(&file))?;
    let filename = normalize_path(&file.to_string_lossy());
    let instrumented = instrument_source(&filename, &source, &options)?;

    if let Some(schema) = schema {
        let registry = Registry::new();
        registry.register(&instrumented.schema);
        let json = serde_json::to_string_pretty(&registry.snapshot())?;
        fs::write(&schema, json).map_err(io_error(&schema))?;
    }

    println!("{}", instrumented.code);
    Ok(())
}

fn run_analyze(registry: PathBuf, config: AnalyzeConfig) -> Result<(), CliError> {
    let dump = fs::read_to_string(&registry).map_err(io_error(&registry))?;
    let snapshot: RegistrySnapshot = serde_json::from_str(&dump)?;

    let filter = PathFilter::new(&config.coverage_path, &config.coverage_exclude)?;
    let mut sources = SourceLines::new();
    for filename in snapshot.files.keys().filter(|f| filter.matches(f)) {
        match fs::read_to_string(filename) {
            Ok(text) => {
                sources.insert(filename.clone(), split_lines(&text));
            }
            Err(err) => warn!(file = filename.as_str(), error = %err, "source not readable"),
        }
    }

    let report = analyze(&config, &snapshot, &sources, None)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let instrument_log = InstrumentLogOptions {
        level: cli.log_level,
        enable_trace: cli.trace,
    };
    initialize_instrumentation_log(&instrument_log);

    match cli.command {
        Commands::Instrument {
            file,
            coverage_variable,
            schema,
        } => run_instrument(
            file,
            InstrumentOptions {
                coverage_variable,
                instrument_log,
            },
            schema,
        ),
        Commands::Analyze {
            registry,
            root,
            exclude,
            base_dir,
        } => run_analyze(
            registry,
            AnalyzeConfig {
                coverage_path: normalize_path(&root),
                coverage_exclude: exclude,
                source_maps: false,
                base_dir,
            },
        ),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
