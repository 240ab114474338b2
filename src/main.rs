mod shutdown;
mod startup;

use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting calendar notifier");

    // Load configuration
    let config = startup::load_config()?;

    // Run until a termination signal arrives
    startup::run_service(config).await
}
