use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use sqlx::{FromRow, MySqlPool};

use super::{LogBook, VoteStore};
use crate::error::DayOffError;
use crate::model::daily_log::DailyLogEntry;
use crate::model::day_off_request::{DayOffRequest, NewDayOffRequest, VoteResult};

const SELECT_COLUMNS: &str = r#"
    SELECT id, requested_by, target_date, reason, votes, created_at, deadline,
           closed, result, announced, message_id, version
    FROM day_off_requests
"#;

/// Raw `day_off_requests` row; `votes` is the JSON-serialized vote map.
#[derive(FromRow)]
struct DayOffRow {
    id: u64,
    requested_by: String,
    target_date: NaiveDate,
    reason: Option<String>,
    votes: String,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    closed: bool,
    result: String,
    announced: bool,
    message_id: Option<String>,
    version: u32,
}

impl TryFrom<DayOffRow> for DayOffRequest {
    type Error = DayOffError;

    fn try_from(row: DayOffRow) -> Result<Self, Self::Error> {
        let votes = if row.votes.trim().is_empty() {
            Default::default()
        } else {
            serde_json::from_str(&row.votes).map_err(|e| {
                DayOffError::StoreUnavailable(format!("malformed votes for request {}: {}", row.id, e))
            })?
        };
        // an unknown result string is treated as not yet written
        let result = row.result.parse().unwrap_or(VoteResult::Unresolved);

        Ok(DayOffRequest {
            id: row.id,
            requested_by: row.requested_by,
            target_date: row.target_date,
            reason: row.reason,
            votes,
            created_at: row.created_at,
            deadline: row.deadline,
            closed: row.closed,
            result,
            announced: row.announced,
            message_id: row.message_id,
            version: row.version,
        }
        .repair())
    }
}

pub struct MySqlVoteStore {
    pool: MySqlPool,
    timeout: Duration,
}

impl MySqlVoteStore {
    pub fn new(pool: MySqlPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, DayOffError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        Ok(tokio::time::timeout(self.timeout, fut).await??)
    }

    /// Streams rows and drops the ones that cannot be decoded.
    async fn fetch_records(&self, sql: &str) -> Result<Vec<DayOffRequest>, DayOffError> {
        let rows = self
            .bounded(async {
                let mut stream = sqlx::query_as::<_, DayOffRow>(sql).fetch(&self.pool);
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await {
                    rows.push(row?);
                }
                Ok::<_, sqlx::Error>(rows)
            })
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match DayOffRequest::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable day-off row"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl VoteStore for MySqlVoteStore {
    async fn insert(&self, new: NewDayOffRequest) -> Result<DayOffRequest, DayOffError> {
        let votes = serde_json::to_string(&new.votes)
            .map_err(|e| DayOffError::InvalidInput(e.to_string()))?;
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO day_off_requests
                        (requested_by, target_date, reason, votes, created_at, deadline,
                         closed, result, announced, version)
                    VALUES (?, ?, ?, ?, ?, ?, FALSE, ?, FALSE, 0)
                    "#,
                )
                .bind(&new.requested_by)
                .bind(new.target_date)
                .bind(&new.reason)
                .bind(&votes)
                .bind(new.created_at)
                .bind(new.deadline)
                .bind(VoteResult::Unresolved.as_ref())
                .execute(&self.pool),
            )
            .await?;

        Ok(DayOffRequest::from_new(result.last_insert_id(), new))
    }

    async fn get(&self, id: u64) -> Result<Option<DayOffRequest>, DayOffError> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row = self
            .bounded(
                sqlx::query_as::<_, DayOffRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(DayOffRequest::try_from).transpose()
    }

    async fn put(&self, record: &DayOffRequest) -> Result<DayOffRequest, DayOffError> {
        let votes = serde_json::to_string(&record.votes)
            .map_err(|e| DayOffError::InvalidInput(e.to_string()))?;

        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE day_off_requests
                    SET reason = ?, votes = ?, closed = ?, result = ?, announced = ?,
                        message_id = ?, version = version + 1
                    WHERE id = ?
                    AND version = ?
                    "#,
                )
                .bind(&record.reason)
                .bind(votes)
                .bind(record.closed)
                .bind(record.result.as_ref())
                .bind(record.announced)
                .bind(&record.message_id)
                .bind(record.id)
                .bind(record.version)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            let exists = self
                .bounded(
                    sqlx::query_scalar::<_, bool>(
                        "SELECT EXISTS(SELECT 1 FROM day_off_requests WHERE id = ? LIMIT 1)",
                    )
                    .bind(record.id)
                    .fetch_one(&self.pool),
                )
                .await?;

            return Err(if exists {
                DayOffError::StaleWrite(record.id)
            } else {
                DayOffError::RequestNotFound(record.id)
            });
        }

        let mut saved = record.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn list_open(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        // result is checked too so half-closed rows are not swept twice
        let sql = format!(
            "{} WHERE closed = FALSE AND result = 'unresolved' ORDER BY id",
            SELECT_COLUMNS
        );
        self.fetch_records(&sql).await
    }

    async fn list_all(&self) -> Result<Vec<DayOffRequest>, DayOffError> {
        let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
        self.fetch_records(&sql).await
    }

    async fn find_by_message(
        &self,
        message_id: &str,
    ) -> Result<Option<DayOffRequest>, DayOffError> {
        let sql = format!("{} WHERE message_id = ? LIMIT 1", SELECT_COLUMNS);
        let row = self
            .bounded(
                sqlx::query_as::<_, DayOffRow>(&sql)
                    .bind(message_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(DayOffRequest::try_from).transpose()
    }
}

pub struct MySqlLogBook {
    pool: MySqlPool,
    timeout: Duration,
}

impl MySqlLogBook {
    pub fn new(pool: MySqlPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl LogBook for MySqlLogBook {
    async fn record(&self, entry: &DailyLogEntry) -> Result<(), DayOffError> {
        let insert = sqlx::query(
            r#"
            INSERT INTO daily_logs (participant_id, log_date, amount, notes, logged_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.participant_id)
        .bind(entry.log_date)
        .bind(entry.amount)
        .bind(&entry.notes)
        .bind(entry.logged_at)
        .execute(&self.pool);

        tokio::time::timeout(self.timeout, insert).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::day_off_request::VoteChoice;
    use chrono::{Duration, TimeZone};

    fn row(votes: &str, closed: bool, result: &str, announced: bool) -> DayOffRow {
        let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        DayOffRow {
            id: 4,
            requested_by: "alice".to_string(),
            target_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            reason: None,
            votes: votes.to_string(),
            created_at,
            deadline: created_at + Duration::hours(12),
            closed,
            result: result.to_string(),
            announced,
            message_id: Some("msg-4".to_string()),
            version: 3,
        }
    }

    #[test]
    fn row_decodes_votes_and_result() {
        let record = DayOffRequest::try_from(row(
            r#"{"alice":"yes","bob":"no"}"#,
            true,
            "approved",
            true,
        ))
        .unwrap();

        assert_eq!(record.votes.get("alice"), Some(&VoteChoice::Yes));
        assert_eq!(record.votes.get("bob"), Some(&VoteChoice::No));
        assert_eq!(record.result, VoteResult::Approved);
        assert!(record.closed && record.announced);
        assert_eq!(record.version, 3);
    }

    #[test]
    fn empty_votes_column_means_no_votes() {
        let record = DayOffRequest::try_from(row("  ", false, "unresolved", false)).unwrap();
        assert!(record.votes.is_empty());
        assert!(record.is_open());
    }

    #[test]
    fn malformed_votes_fail_the_row() {
        let err = DayOffRequest::try_from(row("{alice:", false, "unresolved", false)).unwrap_err();
        assert!(matches!(err, DayOffError::StoreUnavailable(msg) if msg.contains("request 4")));
    }

    #[test]
    fn unknown_result_reads_as_unresolved() {
        let record = DayOffRequest::try_from(row("{}", false, "maybe", false)).unwrap();
        assert_eq!(record.result, VoteResult::Unresolved);
        assert!(record.is_open());
    }

    #[test]
    fn partial_rows_are_repaired_on_load() {
        // result written, closed flag lost
        let record = DayOffRequest::try_from(row("{}", false, "rejected", false)).unwrap();
        assert!(record.closed);
        assert_eq!(record.result, VoteResult::Rejected);

        // announced without closure is re-evaluated
        let record = DayOffRequest::try_from(row("{}", false, "unresolved", true)).unwrap();
        assert!(!record.closed);
        assert!(!record.announced);
    }
}
