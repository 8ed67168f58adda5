use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LogBook, VoteStore};
use crate::error::DayOffError;
use crate::model::daily_log::DailyLogEntry;
use crate::model::day_off_request::{DayOffRequest, NewDayOffRequest};

/// Process-local store for development runs and tests.
#[derive(Default)]
pub struct MemoryVoteStore {
    next_id: AtomicU64,
    records: RwLock<BTreeMap<u64, DayOffRequest>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn insert(&self, new: NewDayOffRequest) -> Result<DayOffRequest, DayOffError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = DayOffRequest::from_new(id, new);
        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: u64) -> Result<Option<DayOffRequest>, DayOffError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn put(&self, record: &DayOffRequest) -> Result<DayOffRequest, DayOffError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or(DayOffError::RequestNotFound(record.id))?;

        if stored.version != record.version {
            return Err(DayOffError::StaleWrite(record.id));
        }

        let mut next = record.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn list_open(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_open())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_message(
        &self,
        message_id: &str,
    ) -> Result<Option<DayOffRequest>, DayOffError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.message_id.as_deref() == Some(message_id))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryLogBook {
    entries: RwLock<Vec<DailyLogEntry>>,
}

impl MemoryLogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DailyLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl LogBook for MemoryLogBook {
    async fn record(&self, entry: &DailyLogEntry) -> Result<(), DayOffError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};

    fn new_request(by: &str) -> NewDayOffRequest {
        let now = Utc::now();
        NewDayOffRequest {
            requested_by: by.to_string(),
            target_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            reason: None,
            created_at: now,
            deadline: now + Duration::hours(12),
            votes: Default::default(),
        }
    }

    #[actix_web::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryVoteStore::new();
        let a = store.insert(new_request("alice")).await.unwrap();
        let b = store.insert(new_request("bob")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn put_bumps_version_and_rejects_stale_copies() {
        let store = MemoryVoteStore::new();
        let original = store.insert(new_request("alice")).await.unwrap();

        let mut first = original.clone();
        first.reason = Some("trip".into());
        let saved = store.put(&first).await.unwrap();
        assert_eq!(saved.version, original.version + 1);

        let mut stale = original.clone();
        stale.reason = Some("other".into());
        assert_eq!(
            store.put(&stale).await,
            Err(DayOffError::StaleWrite(original.id))
        );
        assert_eq!(
            store.get(original.id).await.unwrap().unwrap().reason.as_deref(),
            Some("trip")
        );
    }

    #[actix_web::test]
    async fn list_open_skips_closed_records() {
        let store = MemoryVoteStore::new();
        let mut closed = store.insert(new_request("alice")).await.unwrap();
        store.insert(new_request("bob")).await.unwrap();
        closed.closed = true;
        store.put(&closed).await.unwrap();

        let open = store.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].requested_by, "bob");
    }

    #[actix_web::test]
    async fn find_by_message_matches_bound_prompt() {
        let store = MemoryVoteStore::new();
        let mut req = store.insert(new_request("alice")).await.unwrap();
        req.message_id = Some("998877".into());
        store.put(&req).await.unwrap();

        assert_eq!(
            store.find_by_message("998877").await.unwrap().map(|r| r.id),
            Some(req.id)
        );
        assert!(store.find_by_message("1").await.unwrap().is_none());
    }
}
