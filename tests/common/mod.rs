#![allow(dead_code)]

use async_trait::async_trait;
use calendar_notifier::components::calendar_source::{CalendarStore, StoreEntry};
use calendar_notifier::components::notifier::Notifier;
use calendar_notifier::components::trigger_scheduler::TriggerPayload;
use calendar_notifier::error::{connection_error, store_error, BotResult};
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Current time truncated to whole seconds, matching iCalendar precision
pub fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Build a calendar file holding one event per `(summary, start)` pair
pub fn ics(events: &[(&str, Option<DateTime<Utc>>)]) -> Vec<u8> {
    let mut body = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n");
    for (i, (summary, start)) in events.iter().enumerate() {
        body.push_str(&format!("BEGIN:VEVENT\r\nUID:event-{}\r\nSUMMARY:{}\r\n", i, summary));
        if let Some(start) = start {
            body.push_str(&format!("DTSTART:{}\r\n", start.format("%Y%m%dT%H%M%SZ")));
        }
        body.push_str("END:VEVENT\r\n");
    }
    body.push_str("END:VCALENDAR\r\n");
    body.into_bytes()
}

struct MockFile {
    entry: StoreEntry,
    data: Option<Vec<u8>>,
}

/// In-memory calendar store
#[derive(Default)]
pub struct MockStore {
    unreachable: AtomicBool,
    dirs: Mutex<HashMap<String, Vec<MockFile>>>,
    reads: Mutex<Vec<String>>,
    connects: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a readable file under `/{dir}`
    pub fn with_file(
        self,
        dir: &str,
        name: &str,
        modified: Option<DateTime<Utc>>,
        data: Vec<u8>,
    ) -> Self {
        self.insert(dir, name, modified, Some(data));
        self
    }

    /// Add a file that is listed but fails to read
    pub fn with_unreadable_file(self, dir: &str, name: &str) -> Self {
        self.insert(dir, name, None, None);
        self
    }

    fn insert(&self, dir: &str, name: &str, modified: Option<DateTime<Utc>>, data: Option<Vec<u8>>) {
        self.dirs
            .lock()
            .unwrap()
            .entry(format!("/{}", dir))
            .or_default()
            .push(MockFile {
                entry: StoreEntry {
                    name: name.to_string(),
                    modified,
                    is_collection: false,
                },
                data,
            });
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarStore for MockStore {
    async fn connect(&self) -> BotResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(connection_error("mock store is down"));
        }
        Ok(())
    }

    async fn list(&self, path: &str) -> BotResult<Vec<StoreEntry>> {
        let dirs = self.dirs.lock().unwrap();
        let files = dirs
            .get(path)
            .ok_or_else(|| store_error(&format!("{} not found", path)))?;
        Ok(files.iter().map(|file| file.entry.clone()).collect())
    }

    async fn read(&self, path: &str) -> BotResult<Vec<u8>> {
        self.reads.lock().unwrap().push(path.to_string());

        let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
        let dirs = self.dirs.lock().unwrap();
        dirs.get(dir)
            .and_then(|files| files.iter().find(|file| file.entry.name == name))
            .and_then(|file| file.data.clone())
            .ok_or_else(|| store_error(&format!("cannot read {}", path)))
    }
}

/// Notifier that records every payload it is asked to deliver
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<TriggerPayload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<TriggerPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &TriggerPayload) -> BotResult<()> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
