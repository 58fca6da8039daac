use std::path::PathBuf;

use anyhow::{Context, Result};
use automld::Settings;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "automld")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoML model service", long_about = None)]
struct Args {
    /// Settings file (default: ./automld.{yaml,toml,json} if present)
    #[arg(short, long, env = "AUTOMLD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    automl_core::init_tracing(args.json, level);

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    automld::serve(settings).await
}
