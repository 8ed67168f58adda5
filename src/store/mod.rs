use async_trait::async_trait;

use crate::error::DayOffError;
use crate::model::daily_log::DailyLogEntry;
use crate::model::day_off_request::{DayOffRequest, NewDayOffRequest};

pub mod memory;
pub mod mysql;

pub use memory::{MemoryLogBook, MemoryVoteStore};
pub use mysql::{MySqlLogBook, MySqlVoteStore};

/// Persistent home of day-off requests, keyed by request id.
///
/// Writes are optimistic: `put` succeeds only if the stored `version` still
/// matches the record's, and returns the record with its bumped version.
/// Unreachable or slow backends surface as `StoreUnavailable`.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn insert(&self, new: NewDayOffRequest) -> Result<DayOffRequest, DayOffError>;

    async fn get(&self, id: u64) -> Result<Option<DayOffRequest>, DayOffError>;

    async fn put(&self, record: &DayOffRequest) -> Result<DayOffRequest, DayOffError>;

    async fn list_open(&self) -> Result<Vec<DayOffRequest>, DayOffError>;

    async fn list_all(&self) -> Result<Vec<DayOffRequest>, DayOffError>;

    async fn find_by_message(&self, message_id: &str)
    -> Result<Option<DayOffRequest>, DayOffError>;
}

/// Downstream challenge log the `log` command writes to.
#[async_trait]
pub trait LogBook: Send + Sync {
    async fn record(&self, entry: &DailyLogEntry) -> Result<(), DayOffError>;
}
