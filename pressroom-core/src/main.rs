use anyhow::Result;
use pressroom_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus = telemetry::init(&config.telemetry)?;

    info!("Starting Pressroom Core");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config, prometheus).await
}
