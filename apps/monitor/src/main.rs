use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intake_monitor::MonitorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chromiumoxide=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::parse();
    info!("Starting intake monitor for {}", config.target_url);

    intake_monitor::run(config).await
}
