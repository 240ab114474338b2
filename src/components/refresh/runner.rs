use super::reconcile::reconcile;
use crate::components::calendar_source::{
    read_calendar_events, Calendar, CalendarParser, CalendarStore, FetchWindow,
};
use crate::components::trigger_scheduler::TriggerScheduler;
use crate::config::Config;
use crate::error::BotResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Timing of the refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub window: FetchWindow,
    pub interval: Duration,
    pub shutdown_grace: Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: FetchWindow {
                look_ahead: config.look_ahead(),
                recency: config.recency(),
            },
            interval: config.refresh_interval(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Periodically re-reads the calendars and replaces the armed triggers
pub struct RefreshLoop {
    store: Arc<dyn CalendarStore>,
    parser: Arc<dyn CalendarParser>,
    calendars: Vec<Arc<Calendar>>,
    scheduler: TriggerScheduler,
    settings: RefreshSettings,
}

impl RefreshLoop {
    pub fn new(
        store: Arc<dyn CalendarStore>,
        parser: Arc<dyn CalendarParser>,
        calendars: Vec<Calendar>,
        scheduler: TriggerScheduler,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            parser,
            calendars: calendars.into_iter().map(Arc::new).collect(),
            scheduler,
            settings,
        }
    }

    /// Run one cycle, returning how many triggers were armed.
    ///
    /// When the store cannot be reached the armed triggers are left as they are.
    pub async fn refresh_once(&self, now: DateTime<Utc>) -> BotResult<usize> {
        let batches = read_calendar_events(
            self.store.as_ref(),
            self.parser.as_ref(),
            &self.calendars,
            self.settings.window,
            now,
        )
        .await?;

        let planned = reconcile(&batches);
        self.scheduler.clear_all().await;

        let mut armed = 0;
        for trigger in planned {
            let summary = trigger.payload.summary.clone();
            match self.scheduler.arm(trigger.fire_at, trigger.payload).await {
                Ok(_) => armed += 1,
                Err(e) => warn!("Could not schedule notification for {}: {}", summary, e),
            }
        }
        self.scheduler.start().await;

        Ok(armed)
    }

    /// Refresh until `stop` is cancelled, then shut the scheduler down.
    ///
    /// Returns `false` when notifications were still in flight after the
    /// shutdown grace period.
    pub async fn run(self, stop: CancellationToken) -> bool {
        info!(
            "Refresh loop started for {} calendars, refreshing every {:?}",
            self.calendars.len(),
            self.settings.interval
        );

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                result = self.refresh_once(Utc::now()) => match result {
                    Ok(armed) => info!("Refreshed events, {} notifications scheduled", armed),
                    Err(e) => error!("Failed to refresh events, keeping current schedule: {}", e),
                },
            }

            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = sleep(self.settings.interval) => {}
            }
        }

        info!("Refresh loop stopping");
        self.scheduler.shutdown(self.settings.shutdown_grace).await
    }
}
