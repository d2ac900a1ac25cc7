//! Crisis detector CLI
//!
//! # Usage
//!
//! ```bash
//! # Scan the full history and replace stored crises
//! crisis-detector scan --data-dir data --prices brent.csv
//!
//! # Detect, label, validate and summarize
//! crisis-detector run --config config/pipeline.toml
//!
//! # Relabel and validate without rescanning
//! crisis-detector run --skip-detection
//!
//! # Daily update: analyze only the newest window
//! crisis-detector incremental
//!
//! # Single-break analysis around a date
//! crisis-detector event --date 2020-03-09
//!
//! # Regime report from stored labels
//! crisis-detector report --json
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crisis_detector::config::PipelineConfig;
use crisis_detector::data::{parse_date, DataLoader, GroundTruthEvent, LoaderError, PriceSeries};
use crisis_detector::model::GridPosteriorEngine;
use crisis_detector::pipeline::Pipeline;
use crisis_detector::store::{JsonCrisisStore, JsonRegimeStore};

#[derive(Parser)]
#[command(name = "crisis-detector")]
#[command(about = "Bayesian crisis detection and daily regime labeling")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    opts: CommonOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonOpts {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the input files
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    /// Price file, relative to the data directory
    #[arg(long, global = true)]
    prices: Option<String>,

    /// Ground-truth event file, relative to the data directory
    #[arg(long, global = true)]
    events: Option<String>,

    /// Sliding window size in days
    #[arg(long, global = true)]
    window_size: Option<i64>,

    /// Step between windows in days
    #[arg(long, global = true)]
    step_size: Option<i64>,

    /// Minimum detection confidence (0-1)
    #[arg(long, global = true)]
    min_confidence: Option<f64>,

    /// Posterior draws per window
    #[arg(long, global = true)]
    draws: Option<usize>,

    /// Base sampler seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Worker threads for window analysis (0 = one per core)
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the full history and replace the stored crises
    Scan,

    /// Analyze the most recent window and append any new crisis
    Incremental,

    /// Relabel every day from the stored crises
    Label,

    /// Score the stored crises against ground-truth events
    Validate,

    /// Detect, label, validate and summarize
    Run {
        /// Reuse the stored crises instead of rescanning
        #[arg(long)]
        skip_detection: bool,
    },

    /// Locate the single volatility break in the window around a date
    Event {
        /// Window center (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },

    /// Summarize the stored regime labels
    Report {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(opts: &CommonOpts) -> Result<PipelineConfig> {
    let mut config = match &opts.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &opts.data_dir {
        config.data.data_dir = dir.clone();
    }
    if let Some(prices) = &opts.prices {
        config.data.prices_file = prices.clone();
    }
    if let Some(events) = &opts.events {
        config.data.events_file = events.clone();
    }
    if let Some(window) = opts.window_size {
        config.scanner.window_size_days = window;
    }
    if let Some(step) = opts.step_size {
        config.scanner.step_size_days = step;
    }
    if let Some(min_confidence) = opts.min_confidence {
        config.scanner.min_confidence = min_confidence;
    }
    if let Some(draws) = opts.draws {
        config.sampler.draws = draws;
        config.incremental_sampler.draws = draws;
    }
    if let Some(seed) = opts.seed {
        config.sampler.seed = Some(seed);
        config.incremental_sampler.seed = Some(seed);
    }
    if let Some(workers) = opts.workers {
        config.scanner.max_workers = workers;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_prices(config: &PipelineConfig) -> Result<PriceSeries> {
    DataLoader::new(&config.data.data_dir)
        .load_prices(&config.data.prices_file)
        .with_context(|| format!("Failed to load prices from {}", config.data.prices_file))
}

/// Missing event files validate as "no ground truth" rather than failing the run.
fn load_events(config: &PipelineConfig) -> Result<Vec<GroundTruthEvent>> {
    match DataLoader::new(&config.data.data_dir).load_events(&config.data.events_file) {
        Ok(events) => Ok(events),
        Err(LoaderError::FileNotFound(path)) => {
            warn!("Event file {} not found; skipping ground truth", path);
            Ok(Vec::new())
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to load events from {}", config.data.events_file)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crisis_detector=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.opts)?;

    let pipeline = Pipeline::new(
        GridPosteriorEngine::new(),
        &config,
        Box::new(JsonCrisisStore::new(&config.data.crisis_store)),
        Box::new(JsonRegimeStore::new(&config.data.regime_store)),
    )?;

    match cli.command {
        Commands::Scan => {
            let series = load_prices(&config)?;
            let crises = pipeline.detect(&series)?;
            println!("Detected {} crises", crises.len());
            for crisis in &crises {
                println!(
                    "  {} to {}  confidence {:.3}",
                    crisis.start_date(),
                    crisis.end_date(),
                    crisis.confidence()
                );
            }
        }
        Commands::Incremental => {
            let series = load_prices(&config)?;
            let summary = pipeline.run_incremental(&series)?;
            println!(
                "{} new crises, {} regime days updated",
                summary.new_crises.len(),
                summary.updated_days
            );
        }
        Commands::Label => {
            let series = load_prices(&config)?;
            let days = pipeline.label(&series)?;
            println!("Labeled {} days", days.len());
        }
        Commands::Validate => {
            let events = load_events(&config)?;
            let result = pipeline.validate(&events)?;
            println!("{}", result.summary());
        }
        Commands::Run { skip_detection } => {
            let series = load_prices(&config)?;
            let events = load_events(&config)?;
            let summary = pipeline.run_full(&series, &events, skip_detection)?;
            println!("{}", summary.report.summary());
            println!("{}", summary.validation.summary());
        }
        Commands::Event { date } => {
            let center = parse_date(&date).ok_or_else(|| anyhow!("Invalid date: {}", date))?;
            let series = load_prices(&config)?;
            match pipeline.analyze_date(&series, center)? {
                Some(estimate) => {
                    println!("Breakpoint: {}", estimate.breakpoint_date);
                    println!(
                        "  Volatility: {:.4} -> {:.4} ({:+.2}%)",
                        estimate.volatility_before,
                        estimate.volatility_after,
                        estimate.volatility_change_pct
                    );
                    println!("  Confidence: {:.3}", estimate.confidence);
                }
                None => println!("Not enough observations around {}", center),
            }
        }
        Commands::Report { json } => {
            let report = pipeline.report()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                for period in &report.crisis_periods {
                    println!(
                        "  {} to {} ({} days, avg vol {:.4})",
                        period.start, period.end, period.days, period.avg_volatility
                    );
                }
            }
        }
    }

    Ok(())
}
