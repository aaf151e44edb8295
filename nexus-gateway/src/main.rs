//! Nexus Gateway - Main entry point.

use anyhow::Result;
use nexus_common::config::Config;
use nexus_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Nexus Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Refuse to boot without a credential rather than failing on the first
    // chat request
    if let Err(err) = config.validate_for_startup() {
        tracing::error!(error = %err, "Startup validation failed");
        return Err(err.into());
    }

    // Start the gateway server
    nexus_gateway::start_server(&config).await
}
