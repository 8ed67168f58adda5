use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;

use crate::model::day_off_request::DayOffRequest;

/// Closed + approved requests per target date.
///
/// Approved records never change their result, so entries only go stale when
/// a new approval lands; the service invalidates that date when it does.
#[derive(Clone)]
pub struct ApprovedDayOffCache {
    inner: Cache<NaiveDate, Arc<Vec<DayOffRequest>>>,
}

impl ApprovedDayOffCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(1_000) // one entry per calendar day asked about
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, date: NaiveDate) -> Option<Arc<Vec<DayOffRequest>>> {
        self.inner.get(&date).await
    }

    pub async fn insert(&self, date: NaiveDate, approved: Vec<DayOffRequest>) -> Arc<Vec<DayOffRequest>> {
        let approved = Arc::new(approved);
        self.inner.insert(date, approved.clone()).await;
        approved
    }

    pub async fn invalidate(&self, date: NaiveDate) {
        self.inner.invalidate(&date).await;
    }
}

impl Default for ApprovedDayOffCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
