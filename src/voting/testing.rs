//! Fakes shared by the voting tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use super::announce::{Announcement, Announcer};
use super::service::DayOffService;
use crate::config::{Config, Coverage};
use crate::error::DayOffError;
use crate::model::day_off_request::{DayOffRequest, NewDayOffRequest};
use crate::store::{MemoryLogBook, MemoryVoteStore, VoteStore};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
}

pub fn target_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    sent: Mutex<Vec<Announcement>>,
    failures_left: AtomicU32,
}

impl RecordingAnnouncer {
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Announcement> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> Result<(), DayOffError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(DayOffError::AnnouncementFailed("channel unreachable".into()));
        }
        self.sent.lock().unwrap().push(announcement.clone());
        Ok(())
    }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryVoteStore,
    stale_puts: AtomicU32,
    puts_before_outage: Mutex<Option<u32>>,
    down: AtomicBool,
    broken: Mutex<HashSet<u64>>,
    list_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn stale_puts(&self, n: u32) {
        self.stale_puts.store(n, Ordering::SeqCst);
    }

    /// Lets `n` more puts through, then fails every put until healed.
    pub fn fail_puts_after(&self, n: u32) {
        *self.puts_before_outage.lock().unwrap() = Some(n);
    }

    pub fn heal_puts(&self) {
        *self.puts_before_outage.lock().unwrap() = None;
    }

    pub fn slow_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Reads of `id` fail as if its row were unreachable.
    pub fn break_record(&self, id: u64) {
        self.broken.lock().unwrap().insert(id);
    }

    fn check(&self) -> Result<(), DayOffError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DayOffError::StoreUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl VoteStore for FlakyStore {
    async fn insert(&self, new: NewDayOffRequest) -> Result<DayOffRequest, DayOffError> {
        self.check()?;
        self.inner.insert(new).await
    }

    async fn get(&self, id: u64) -> Result<Option<DayOffRequest>, DayOffError> {
        self.check()?;
        if self.broken.lock().unwrap().contains(&id) {
            return Err(DayOffError::StoreUnavailable(format!("row {} unreachable", id)));
        }
        self.inner.get(id).await
    }

    async fn put(&self, record: &DayOffRequest) -> Result<DayOffRequest, DayOffError> {
        self.check()?;
        let left = self.stale_puts.load(Ordering::SeqCst);
        if left > 0 {
            self.stale_puts.store(left - 1, Ordering::SeqCst);
            return Err(DayOffError::StaleWrite(record.id));
        }
        {
            let mut budget = self.puts_before_outage.lock().unwrap();
            match budget.as_mut() {
                Some(0) => return Err(DayOffError::StoreUnavailable("timeout".into())),
                Some(left) => *left -= 1,
                None => {}
            }
        }
        self.inner.put(record).await
    }

    async fn list_open(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        self.check()?;
        self.inner.list_open().await
    }

    async fn list_all(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        self.check()?;
        let snapshot = self.inner.list_all().await;
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        snapshot
    }

    async fn find_by_message(
        &self,
        message_id: &str,
    ) -> Result<Option<DayOffRequest>, DayOffError> {
        self.check()?;
        self.inner.find_by_message(message_id).await
    }
}

pub struct Harness {
    pub service: Arc<DayOffService>,
    pub store: Arc<FlakyStore>,
    pub log_book: Arc<MemoryLogBook>,
    pub announcer: Arc<RecordingAnnouncer>,
}

impl Harness {
    /// Threshold as given, 12h deadline, everyone covered, no requester vote.
    pub fn new(threshold: u32) -> Self {
        Self::with_coverage(threshold, Coverage::Everyone)
    }

    /// Requests start without the requester's own vote so counts stay explicit.
    pub fn with_coverage(threshold: u32, coverage: Coverage) -> Self {
        Self::with_config(Config {
            yes_threshold: threshold,
            deadline_hours: 12,
            coverage,
            requester_votes_yes: false,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(FlakyStore::default());
        let log_book = Arc::new(MemoryLogBook::new());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let service = Arc::new(DayOffService::new(
            store.clone(),
            log_book.clone(),
            announcer.clone(),
            &config,
        ));
        Self {
            service,
            store,
            log_book,
            announcer,
        }
    }

    pub async fn request(&self, by: &str) -> DayOffRequest {
        self.service
            .create_request(by, target_day(), None, t0())
            .await
            .unwrap()
    }

    pub async fn record(&self, id: u64) -> DayOffRequest {
        self.store.inner.get(id).await.unwrap().unwrap()
    }
}
