use crate::components::calendar_source::models::Calendar;
use crate::error::{config_error, env_error, BotResult};
use chrono::Utc;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Default refresh interval in minutes
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 10;
/// Default look-ahead offset added on top of the refresh interval
pub const DEFAULT_LOOKAHEAD_OFFSET_MINUTES: u64 = 30;
/// Default recency window for calendar files
pub const DEFAULT_RECENCY_DAYS: u64 = 5;
/// Default grace period for shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;
/// Default timeout for outbound HTTP requests
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Separator between entries of the calendar and webhook lists
const ENTRY_SEPARATOR: char = ',';
/// Separator between the two halves of an entry
const PAIR_SEPARATOR: char = '|';

/// Main configuration structure for the notifier
#[derive(Debug, Clone)]
pub struct Config {
    /// Nextcloud user
    pub nextcloud_user: String,
    /// Nextcloud password or app token
    pub nextcloud_password: String,
    /// Nextcloud server base URL
    pub nextcloud_server: String,
    /// Calendars to watch, in configuration order
    pub calendars: Vec<Calendar>,
    /// Minutes between two refreshes
    pub refresh_interval_minutes: u64,
    /// Minutes added to the refresh interval to get the look-ahead window
    pub lookahead_offset_minutes: u64,
    /// Calendar files older than this many days are not re-read
    pub recency_days: u64,
    /// Seconds to wait for in-flight notifications on shutdown
    pub shutdown_grace_seconds: u64,
    /// Timeout for store and webhook requests
    pub http_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> BotResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> BotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| env_error(key));

        let nextcloud_user = required("NEXTCLOUD_USER")?;
        let nextcloud_password = required("NEXTCLOUD_PASSWORD")?;
        let nextcloud_server = required("NEXTCLOUD_SERVER")?;
        let calendars_env = required("NEXTCLOUD_CALENDARS")?;
        let webhooks_env = required("WEBHOOKS")?;

        let calendars = parse_calendars(&calendars_env, &webhooks_env);
        if calendars.is_empty() {
            return Err(config_error(
                "No calendar in NEXTCLOUD_CALENDARS has a matching entry in WEBHOOKS",
            ));
        }

        let refresh_interval_minutes = parse_number(
            &lookup,
            "REFRESH_INTERVAL_MINUTES",
            DEFAULT_REFRESH_INTERVAL_MINUTES,
        )?;
        if refresh_interval_minutes == 0 {
            return Err(config_error("REFRESH_INTERVAL_MINUTES must be at least 1"));
        }

        let config = Config {
            nextcloud_user,
            nextcloud_password,
            nextcloud_server,
            calendars,
            refresh_interval_minutes,
            lookahead_offset_minutes: parse_number(
                &lookup,
                "LOOKAHEAD_OFFSET_MINUTES",
                DEFAULT_LOOKAHEAD_OFFSET_MINUTES,
            )?,
            recency_days: parse_number(&lookup, "RECENCY_DAYS", DEFAULT_RECENCY_DAYS)?,
            shutdown_grace_seconds: parse_number(
                &lookup,
                "SHUTDOWN_GRACE_SECONDS",
                DEFAULT_SHUTDOWN_GRACE_SECONDS,
            )?,
            http_timeout_seconds: parse_number(
                &lookup,
                "HTTP_TIMEOUT_SECONDS",
                DEFAULT_HTTP_TIMEOUT_SECONDS,
            )?,
        };

        config.check_windows()?;
        Ok(config)
    }

    /// Reject intervals and windows that cannot be applied to the current time
    fn check_windows(&self) -> BotResult<()> {
        let interval = self
            .refresh_interval_minutes
            .checked_mul(60)
            .ok_or_else(|| config_error("REFRESH_INTERVAL_MINUTES is too large"))?;
        let look_ahead = self
            .refresh_interval_minutes
            .checked_add(self.lookahead_offset_minutes)
            .and_then(|minutes| minutes.checked_mul(60))
            .ok_or_else(|| config_error("LOOKAHEAD_OFFSET_MINUTES is too large"))?;
        let recency = self
            .recency_days
            .checked_mul(24 * 60 * 60)
            .ok_or_else(|| config_error("RECENCY_DAYS is too large"))?;

        let now = Utc::now();
        let offset = |seconds: u64| {
            chrono::Duration::from_std(Duration::from_secs(seconds)).ok()
        };

        offset(interval)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| config_error("REFRESH_INTERVAL_MINUTES is too large"))?;
        offset(look_ahead)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| config_error("LOOKAHEAD_OFFSET_MINUTES is too large"))?;
        offset(recency)
            .and_then(|d| now.checked_sub_signed(d))
            .ok_or_else(|| config_error("RECENCY_DAYS is too large"))?;

        Ok(())
    }

    /// WebDAV root holding the user's calendars
    pub fn calendar_root(&self) -> String {
        format!(
            "{}/remote.php/dav/calendars/{}/",
            self.nextcloud_server.trim_end_matches('/'),
            self.nextcloud_user
        )
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    /// Events starting within this window from now get a trigger
    pub fn look_ahead(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_minutes
                .saturating_add(self.lookahead_offset_minutes)
                .saturating_mul(60),
        )
    }

    pub fn recency(&self) -> Duration {
        Duration::from_secs(self.recency_days.saturating_mul(24 * 60 * 60))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Parse an optional numeric variable, falling back to a default when unset
fn parse_number<F>(lookup: &F, key: &str, default: u64) -> BotResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map_err(|_| config_error(&format!("Invalid {} format: {}", key, value))),
        _ => Ok(default),
    }
}

/// Pair `name|webhookKey` entries with `webhookKey|url` entries.
///
/// Malformed entries and calendars without a matching webhook are dropped.
/// When a key appears more than once in the webhook list the last one wins.
pub fn parse_calendars(calendars_env: &str, webhooks_env: &str) -> Vec<Calendar> {
    let webhooks: Vec<(&str, &str)> = webhooks_env
        .split(ENTRY_SEPARATOR)
        .filter_map(split_pair)
        .collect();

    calendars_env
        .split(ENTRY_SEPARATOR)
        .filter_map(split_pair)
        .filter_map(|(name, key)| {
            let webhook = webhooks
                .iter()
                .rev()
                .find(|(webhook_key, _)| *webhook_key == key)
                .map(|(_, url)| *url)
                .filter(|url| !url.is_empty())?;
            Some(Calendar::new(name, webhook))
        })
        .collect()
}

fn split_pair(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.split(PAIR_SEPARATOR);
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second))
}
