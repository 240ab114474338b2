use crate::shutdown;
use calendar_notifier::components::calendar_source::{IcsParser, WebDavStore};
use calendar_notifier::components::notifier::WebhookNotifier;
use calendar_notifier::components::refresh::{RefreshLoop, RefreshSettings};
use calendar_notifier::components::trigger_scheduler::TriggerScheduler;
use calendar_notifier::config::Config;
use calendar_notifier::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config, failing fast on misconfiguration
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => {
            for calendar in &config.calendars {
                info!("Watching calendar {}", calendar.name);
            }
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire the components together and run until a termination signal
pub async fn run_service(config: Config) -> miette::Result<()> {
    let store = WebDavStore::new(
        config.calendar_root(),
        config.nextcloud_user.clone(),
        config.nextcloud_password.clone(),
        config.http_timeout(),
    )?;
    let notifier = WebhookNotifier::new(config.http_timeout())?;
    let scheduler = TriggerScheduler::new(Arc::new(notifier));

    let settings = RefreshSettings::from_config(&config);
    let refresh_loop = RefreshLoop::new(
        Arc::new(store),
        Arc::new(IcsParser::new()),
        config.calendars,
        scheduler,
        settings,
    );

    // Create shutdown token
    let stop = CancellationToken::new();

    // Spawn signal handler task
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        shutdown::handle_signals(signal_stop).await;
    });

    let loop_handle = tokio::spawn(refresh_loop.run(stop));

    match loop_handle.await {
        Ok(true) => {
            info!("Calendar notifier stopped");
            Ok(())
        }
        Ok(false) => {
            warn!("Calendar notifier stopped with notifications still in flight");
            Ok(())
        }
        Err(e) => {
            error!("Refresh loop task error: {:?}", e);
            Err(Error::Other(format!("Refresh loop task error: {}", e)).into())
        }
    }
}
