//! nodegen: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse flags
//!   3. Resolve the log filter (`-v` > NODEGEN_LOG_LEVEL > RUST_LOG > info)
//!   4. Init logger once
//!   5. Resolve options (base dir, password from stdin)
//!   6. Generate identity and config, print the device ID

use std::env;

use clap::Parser;
use tracing::{info, warn};

use nodegen::cli::Cli;
use nodegen::error::AppError;
use nodegen::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log = logger::resolve_level(
        cli.verbose,
        env::var(logger::LEVEL_ENV).ok().as_deref(),
        env::var("RUST_LOG").ok().as_deref(),
    );
    logger::init(&log)?;
    for (var, value) in &log.ignored {
        warn!(%var, %value, "ignoring unusable log setting");
    }

    let opts = cli.into_options(std::io::stdin().lock())?;
    info!(
        base_dir = %opts.locations.base_dir().display(),
        log_filter = %log.directive,
        "generating keys and config"
    );

    let device_id = nodegen::generate(&opts).await?;
    println!("Device ID: {device_id}");

    Ok(())
}
