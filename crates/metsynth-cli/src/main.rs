mod config;
mod pipeline;
mod registry;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, load_config};
use metsynth_core::{build_relationship_graph, load_dataset};
use metsynth_generate::ResamplingSynthesizer;
use metsynth_mets::{DocumentValidator, ValidationReportError};
use pipeline::{Pipeline, PipelineError};
use registry::{
    RegistryError, RunContext, init_console_logging, init_run_logging, start_run,
    write_json_atomic,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("core error: {0}")]
    Core(#[from] metsynth_core::Error),
    #[error("validation setup failed: {0}")]
    Validation(#[from] ValidationReportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document failed validation with {0} violation(s)")]
    DocumentInvalid(usize),
}

#[derive(Parser, Debug)]
#[command(name = "metsynth", version, about = "Synthetic METS package generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, reassemble and validate a synthetic package.
    Run(RunArgs),
    /// Print the relationship graph for the configured inputs.
    Graph(GraphArgs),
    /// Validate an existing package document.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Override `model.random_seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Override `output.run_dir`.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GraphArgs {
    /// Pipeline configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Write graph.json here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Document to validate.
    document: PathBuf,
    /// Named schema as NAME=PATH; repeatable.
    #[arg(long = "schema", value_name = "NAME=PATH", value_parser = parse_named_path, required = true)]
    schemas: Vec<(String, PathBuf)>,
    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_pipeline(args),
        Command::Graph(args) => print_graph(args),
        Command::Validate(args) => validate_document(args),
    }
}

fn run_pipeline(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.config)?;
    if let Some(seed) = args.seed {
        config.model.random_seed = seed;
    }
    if let Some(run_dir) = args.run_dir {
        config.output.run_dir = run_dir;
    }

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        config: config.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path, &config.logging.level)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        seed = config.model.random_seed,
        run_root = %run_paths.root.display()
    );

    let timer = Instant::now();
    let mut pipeline = Pipeline::new(config, ResamplingSynthesizer::new());

    match pipeline.run(&run_paths) {
        Ok(summary) => {
            let valid = summary.validation.as_ref().map(|outcome| outcome.valid);
            tracing::info!(
                event = "run_finished",
                status = "success",
                duration_ms = timer.elapsed().as_millis() as u64,
                document = %summary.document_path.display(),
                valid = ?valid
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                event = "run_failed",
                elapsed_ms = timer.elapsed().as_millis() as u64,
                error = %err
            );
            Err(err.into())
        }
    }
}

fn print_graph(args: GraphArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    init_console_logging(&config.logging.level)?;

    let dataset = load_dataset(&config.input)?;
    let graph = build_relationship_graph(&dataset)?;

    match args.out {
        Some(path) => {
            write_json_atomic(&path, &graph)?;
            tracing::info!(event = "graph_built", path = %path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&graph)?),
    }
    Ok(())
}

fn validate_document(args: ValidateArgs) -> Result<(), CliError> {
    init_console_logging(&args.log_level)?;

    let schema_paths: BTreeMap<String, PathBuf> = args.schemas.into_iter().collect();
    let validator = DocumentValidator::load(&schema_paths)?;
    let xml = std::fs::read_to_string(&args.document)?;

    let outcome = validator.validate_str(&xml);
    tracing::info!(
        event = "validation_finished",
        valid = outcome.valid,
        violations = outcome.violations.len()
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.valid {
        Ok(())
    } else {
        Err(CliError::DocumentInvalid(outcome.violations.len()))
    }
}

fn parse_named_path(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{value}'")),
    }
}
