use super::models::{TriggerId, TriggerPayload};
use crate::components::notifier::Notifier;
use crate::error::{scheduler_error, BotResult};
use crate::utils::time::until;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::{sleep, timeout};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

struct ArmedTrigger {
    fire_at: DateTime<Utc>,
    payload: TriggerPayload,
    /// Set once the scheduler is started and the timer task exists
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Registry {
    started: bool,
    closed: bool,
    armed: HashMap<TriggerId, ArmedTrigger>,
}

struct Inner {
    registry: Mutex<Registry>,
    notifier: Arc<dyn Notifier>,
    tracker: TaskTracker,
}

/// Registry of one-shot triggers.
///
/// A trigger leaves the registry exactly once, either when its timer claims
/// it to fire or when it is cancelled. Both happen under the registry lock,
/// so a cancelled trigger never fires and a firing one is never cancelled.
#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<Inner>,
}

impl TriggerScheduler {
    /// Create a stopped scheduler delivering through `notifier`
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                notifier,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Cancel every trigger that has not fired yet, returning how many were cancelled
    pub async fn clear_all(&self) -> usize {
        let mut registry = self.inner.registry.lock().await;
        let cancelled = registry.armed.len();
        for (_, trigger) in registry.armed.drain() {
            if let Some(timer) = trigger.timer {
                timer.abort();
            }
        }
        debug!("Cancelled {} armed triggers", cancelled);
        cancelled
    }

    /// Arm a trigger firing at `fire_at`; past times fire as soon as the scheduler runs
    pub async fn arm(&self, fire_at: DateTime<Utc>, payload: TriggerPayload) -> BotResult<TriggerId> {
        let mut registry = self.inner.registry.lock().await;
        if registry.closed {
            return Err(scheduler_error("Scheduler is shut down"));
        }

        let id = TriggerId::new();
        let timer = registry.started.then(|| self.spawn_timer(id, fire_at));
        registry.armed.insert(
            id,
            ArmedTrigger {
                fire_at,
                payload,
                timer,
            },
        );

        Ok(id)
    }

    /// Start delivering triggers. Calling it again is harmless.
    pub async fn start(&self) {
        let mut registry = self.inner.registry.lock().await;
        if registry.closed {
            warn!("Ignoring start of a scheduler that is shut down");
            return;
        }
        registry.started = true;

        for (id, trigger) in registry.armed.iter_mut() {
            if trigger.timer.is_none() {
                trigger.timer = Some(self.spawn_timer(*id, trigger.fire_at));
            }
        }
    }

    /// Cancel pending triggers and wait up to `grace` for notifications in flight.
    ///
    /// Returns false when the wait ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let cancelled = {
            let mut registry = self.inner.registry.lock().await;
            registry.closed = true;
            registry.started = false;
            let cancelled = registry.armed.len();
            for (_, trigger) in registry.armed.drain() {
                if let Some(timer) = trigger.timer {
                    timer.abort();
                }
            }
            cancelled
        };
        info!("Scheduler shutting down, cancelled {} pending triggers", cancelled);

        self.inner.tracker.close();
        match timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => {
                info!("Scheduler shut down");
                true
            }
            Err(_) => {
                warn!(
                    "Notifications still in flight after {:?}, giving up on them",
                    grace
                );
                false
            }
        }
    }

    /// Number of triggers armed and not yet fired
    pub async fn armed_count(&self) -> usize {
        self.inner.registry.lock().await.armed.len()
    }

    /// Identities of triggers armed and not yet fired
    pub async fn armed_ids(&self) -> Vec<TriggerId> {
        self.inner.registry.lock().await.armed.keys().copied().collect()
    }

    fn spawn_timer(&self, id: TriggerId, fire_at: DateTime<Utc>) -> AbortHandle {
        let inner = Arc::clone(&self.inner);
        let delay = until(fire_at, Utc::now());

        let task = self.inner.tracker.spawn(async move {
            sleep(delay).await;

            let claimed = inner.registry.lock().await.armed.remove(&id);
            let Some(trigger) = claimed else {
                return;
            };

            info!(
                "Event starting: {} ({})",
                trigger.payload.summary, trigger.payload.calendar.name
            );
            if let Err(e) = inner.notifier.notify(&trigger.payload).await {
                error!(
                    "Failed to notify {} about {}: {}",
                    trigger.payload.calendar.name, trigger.payload.summary, e
                );
            }
        });

        task.abort_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::calendar_source::Calendar;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    #[derive(Default)]
    struct RecordingNotifier {
        delay: Duration,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                sent: Mutex::new(Vec::new()),
            }
        }

        async fn sent(&self) -> Vec<String> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, payload: &TriggerPayload) -> BotResult<()> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.sent.lock().await.push(payload.summary.clone());
            Ok(())
        }
    }

    fn payload(summary: &str) -> TriggerPayload {
        TriggerPayload {
            summary: summary.to_string(),
            calendar: Arc::new(Calendar::new("work", "https://a")),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn past_trigger_fires_right_after_start() {
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TriggerScheduler::new(notifier.clone());

        scheduler
            .arm(Utc::now() - ChronoDuration::minutes(1), payload("late"))
            .await
            .unwrap();
        sleep(Duration::from_secs(60)).await;
        assert!(notifier.sent().await.is_empty());

        scheduler.start().await;
        sleep(Duration::from_millis(10)).await;

        assert_eq!(notifier.sent().await, vec!["late"]);
        assert_eq!(scheduler.armed_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn future_trigger_fires_once_at_its_time() {
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TriggerScheduler::new(notifier.clone());
        scheduler.start().await;

        scheduler
            .arm(Utc::now() + ChronoDuration::hours(1), payload("meeting"))
            .await
            .unwrap();

        sleep(Duration::from_secs(30 * 60)).await;
        assert!(notifier.sent().await.is_empty());

        sleep(Duration::from_secs(31 * 60)).await;
        assert_eq!(notifier.sent().await, vec!["meeting"]);

        sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(notifier.sent().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_triggers_never_fire() {
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TriggerScheduler::new(notifier.clone());

        for summary in ["a", "b"] {
            scheduler
                .arm(Utc::now() + ChronoDuration::minutes(5), payload(summary))
                .await
                .unwrap();
        }
        scheduler.start().await;

        assert_eq!(scheduler.clear_all().await, 2);
        sleep(Duration::from_secs(3600)).await;

        assert!(notifier.sent().await.is_empty());
        assert_eq!(scheduler.armed_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_after_clear_yields_fresh_ids() {
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TriggerScheduler::new(notifier);
        let fire_at = Utc::now() + ChronoDuration::minutes(5);

        for summary in ["a", "b", "c"] {
            scheduler.arm(fire_at, payload(summary)).await.unwrap();
        }
        let before = scheduler.armed_ids().await;

        scheduler.clear_all().await;
        for summary in ["a", "b", "c", "d"] {
            scheduler.arm(fire_at, payload(summary)).await.unwrap();
        }
        let after = scheduler.armed_ids().await;

        assert_eq!(after.len(), 4);
        assert!(after.iter().all(|id| !before.contains(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_does_not_cancel_a_firing_trigger() {
        let notifier = Arc::new(RecordingNotifier::slow(Duration::from_secs(10)));
        let scheduler = TriggerScheduler::new(notifier.clone());

        scheduler.arm(Utc::now(), payload("now")).await.unwrap();
        scheduler.start().await;
        sleep(Duration::from_millis(10)).await;

        assert_eq!(scheduler.clear_all().await, 0);
        sleep(Duration::from_secs(20)).await;

        assert_eq!(notifier.sent().await, vec!["now"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_rejects_new_triggers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TriggerScheduler::new(notifier);
        scheduler.start().await;
        scheduler
            .arm(Utc::now() + ChronoDuration::hours(1), payload("pending"))
            .await
            .unwrap();

        assert!(scheduler.shutdown(Duration::from_secs(5)).await);
        assert_eq!(scheduler.armed_count().await, 0);

        let result = scheduler.arm(Utc::now(), payload("too late")).await;
        assert!(matches!(result, Err(crate::error::Error::Scheduler(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wait_is_bounded() {
        let notifier = Arc::new(RecordingNotifier::slow(Duration::from_secs(60)));
        let scheduler = TriggerScheduler::new(notifier.clone());

        scheduler.arm(Utc::now(), payload("slow")).await.unwrap();
        scheduler.start().await;
        sleep(Duration::from_millis(10)).await;

        assert!(!scheduler.shutdown(Duration::from_secs(5)).await);
    }
}
