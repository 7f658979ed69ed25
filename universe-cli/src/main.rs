//! Universe CLI: build a universe from a configuration file.
//!
//! Commands:
//! - `run`: execute every pipeline stage and write the universe as Parquet
//! - `graph`: print the data and pipeline dependency structure

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use universe_runner::{parse_parameters, RunSummary, UniverseConfig, UniverseRunner};

#[derive(Parser)]
#[command(
    name = "universe",
    about = "Universe builder: lazy data catalog, inclusion pipeline, combined universe"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the pipeline and write stage and final universes.
    Run {
        /// Path to a TOML config file.
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Parameters substituted into `{key}` placeholders (key=value).
        #[arg(long = "parameter", short = 'p')]
        parameters: Vec<String>,

        /// Log at debug level.
        #[arg(long, short = 'v', default_value_t = false)]
        verbose: bool,
    },
    /// Print data entries and pipeline stages with their references.
    Graph {
        /// Path to a TOML config file.
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Parameters substituted into `{key}` placeholders (key=value).
        #[arg(long = "parameter", short = 'p')]
        parameters: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            parameters,
            verbose,
        } => {
            init_logging(verbose);
            run_cmd(&config, &parameters)
        }
        Commands::Graph { config, parameters } => {
            init_logging(false);
            graph_cmd(&config, &parameters)
        }
    }
}

/// `RUST_LOG` wins unless `--verbose` is given.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: &Path, parameters: &[String]) -> Result<UniverseConfig> {
    let parameters: BTreeMap<String, String> = parse_parameters(parameters)?;
    info!(?parameters, "parsed parameters");
    UniverseConfig::load(path, &parameters)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn run_cmd(config_path: &Path, parameters: &[String]) -> Result<()> {
    let config = load_config(config_path, parameters)?;
    let mut runner = UniverseRunner::new(config)?;
    let summary = runner.run()?;
    print_summary(&summary);
    Ok(())
}

fn graph_cmd(config_path: &Path, parameters: &[String]) -> Result<()> {
    let config = load_config(config_path, parameters)?;
    let catalog = config.catalog()?;
    let pipelines = config.pipelines()?;

    println!("Data:");
    for definition in catalog.iter() {
        println!(
            "  {} = {}({})",
            definition.name(),
            definition.function(),
            join(definition.references())
        );
    }
    println!();
    println!("Pipeline:");
    for (position, stage) in pipelines.iter().enumerate() {
        println!(
            "  {}. {} = {}({})",
            position + 1,
            stage.name(),
            stage.function(),
            join(stage.references())
        );
    }
    Ok(())
}

fn join(names: impl IntoIterator<Item = String>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

fn print_summary(summary: &RunSummary) {
    let manifest = &summary.manifest;
    println!();
    println!("=== Universe Run ===");
    println!("Run id:         {}", manifest.run_id);
    println!(
        "Calendar:       {} to {} ({})",
        manifest.calendar.start(),
        manifest.calendar.last(),
        manifest.calendar.frequency()
    );
    println!("Duration:       {:.2}s", manifest.duration_secs);
    println!();
    println!(
        "{:<24} {:>8} {:>8} {:>10} {:>8}",
        "Stage", "Rows", "Cols", "Included", "Unknown"
    );
    for frame in manifest.stages.iter().chain(std::iter::once(&manifest.universe)) {
        println!(
            "{:<24} {:>8} {:>8} {:>10} {:>8}",
            frame.name, frame.rows, frame.columns, frame.included, frame.unknown
        );
    }
    println!();
    println!("Universe saved to: {}", manifest.universe.path.display());
}
