//! Touch-price trigger bot - Entry Point
//!
//! Replays a recorded feed through the trigger engine against the paper
//! broker.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Touch-price conditional order bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TOUCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Feed file to replay, overriding `feed_path` in the configuration
    #[arg(short, long)]
    feed: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    touch_telemetry::init_logging()?;

    info!("Starting touch-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > TOUCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TOUCH_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let mut config = touch_bot::AppConfig::from_file(&config_path)?;
    if let Some(feed) = args.feed {
        config.feed_path = feed;
    }
    info!(
        arm_policy = ?config.engine.arm_policy,
        contracts = config.contracts.len(),
        "Configuration loaded"
    );

    let app = touch_bot::Application::new(config);
    let stats = app.run().await?;
    info!(?stats, "Done");

    Ok(())
}
