//! automl - train, inspect and use AutoML model artifacts from the shell
//!
//! ## Commands
//!
//! - `train`: run one training cycle for a dataset directory
//! - `predict`: predict a CSV file with a stored artifact
//! - `metrics`: show the stored metrics of an artifact
//! - `recover`: finish or undo an interrupted artifact swap

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use automl_core::{
    predict_csv, ArtifactDigest, BaselineEngine, DatasetConfig, Lifecycle, Metrics, Prediction,
    Recovery, ReplacePolicy, TaskKind, TrainingOutcome, METRICS,
};
use chrono::{DateTime, Local, TimeZone};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, compare and replace AutoML model artifacts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a dataset directory and keep the result only if it is better
    Train {
        /// Dataset directory containing config.yaml
        data_root: PathBuf,

        /// Time budget in minutes
        #[arg(short = 't', long = "timeout", default_value_t = 5.0, env = "AUTOML_TIMEOUT")]
        timeout: f64,

        /// Directory holding artifact directories
        #[arg(long, default_value = "runs", env = "AUTOML_SAVE_DIR")]
        save_dir: PathBuf,

        /// Artifact name (default: <dataset>_<dd-mm-YYYY_HH-MM-SS>)
        #[arg(long)]
        save_name: Option<String>,

        /// Replacement policy: best | last
        #[arg(long, default_value = "best", env = "AUTOML_REPLACE_POLICY")]
        policy: ReplacePolicy,
    },

    /// Predict every row of a CSV file
    Predict {
        /// Task kind the artifact was trained for
        task: String,

        /// CSV file with the feature columns
        #[arg(short = 'd', long = "data")]
        data: PathBuf,

        /// Artifact directory
        #[arg(short = 'w', long = "weights")]
        weights: PathBuf,
    },

    /// Show the stored metrics of an artifact
    Metrics {
        /// Artifact directory
        dir: PathBuf,
    },

    /// Finish or undo an interrupted artifact swap
    Recover {
        /// Artifact directory
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    automl_core::init_tracing(cli.json, level);

    let lifecycle = Lifecycle::new(Arc::new(BaselineEngine::new()));

    let output = match cli.command {
        Commands::Train {
            data_root,
            timeout,
            save_dir,
            save_name,
            policy,
        } => {
            let outcome = cmd_train(
                &lifecycle,
                &data_root,
                timeout,
                &save_dir,
                save_name.as_deref(),
                policy,
            )?;
            serde_json::to_string_pretty(&outcome)?
        }
        Commands::Predict {
            task,
            data,
            weights,
        } => {
            let predictions = cmd_predict(&lifecycle, &task, &data, &weights)?;
            serde_json::to_string_pretty(&predictions)?
        }
        Commands::Metrics { dir } => serde_json::to_string_pretty(&cmd_metrics(&dir)?)?,
        Commands::Recover { dir } => cmd_recover(&dir)?,
    };
    println!("{output}");

    METRICS.flush();
    Ok(())
}

/// `<dataset name>_<dd-mm-YYYY_HH-MM-SS>`
fn default_save_name<Tz: TimeZone>(data_root: &Path, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let dataset = data_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    format!("{}_{}", dataset, now.format("%d-%m-%Y_%H-%M-%S"))
}

fn cmd_train(
    lifecycle: &Lifecycle,
    data_root: &Path,
    timeout: f64,
    save_dir: &Path,
    save_name: Option<&str>,
    policy: ReplacePolicy,
) -> Result<TrainingOutcome> {
    let config = DatasetConfig::load(data_root)
        .with_context(|| format!("Failed to read dataset config in {}", data_root.display()))?;
    let name = match save_name {
        Some(name) => name.to_string(),
        None => default_save_name(data_root, &Local::now()),
    };
    let weights = save_dir.join(&name);

    info!(dataset = %data_root.display(), weights = %weights.display(), %policy, "Training");
    let outcome = lifecycle
        .run_training_cycle(data_root, &config, &weights, timeout, policy)
        .with_context(|| format!("Training cycle for {} failed", data_root.display()))?;
    Ok(outcome)
}

fn cmd_predict(
    lifecycle: &Lifecycle,
    task: &str,
    data: &Path,
    weights: &Path,
) -> Result<Vec<Prediction>> {
    let task: TaskKind = task.parse()?;
    let csv = std::fs::read(data).with_context(|| format!("Failed to read {}", data.display()))?;
    let predictions = predict_csv(lifecycle.engine(), task, weights, &csv)
        .with_context(|| format!("Prediction with {} failed", weights.display()))?;
    Ok(predictions)
}

#[derive(Debug, Serialize)]
struct MetricsReport {
    directory: PathBuf,
    digest: ArtifactDigest,
    metrics: Metrics,
}

fn cmd_metrics(dir: &Path) -> Result<MetricsReport> {
    let artifact = automl_core::load_artifact(dir)
        .with_context(|| format!("No artifact at {}", dir.display()))?;
    let digest = ArtifactDigest::of_dir(dir)?;
    Ok(MetricsReport {
        directory: artifact.directory,
        digest,
        metrics: artifact.metrics,
    })
}

fn cmd_recover(dir: &Path) -> Result<String> {
    if !dir.exists() && !automl_core::store::holder_path(dir)?.exists() {
        bail!("Nothing to recover at {}", dir.display());
    }
    let message = match automl_core::recover(dir)? {
        Recovery::Clean => "No interrupted swap found",
        Recovery::Completed => "Interrupted swap completed: new artifact kept",
        Recovery::RolledBack => "Interrupted swap rolled back: previous artifact restored",
    };
    Ok(format!("{}: {}", dir.display(), message))
}
