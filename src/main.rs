use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use linkhub::config::Args;

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();

    if let Err(e) = linkhub::run(args).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
