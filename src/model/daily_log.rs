use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One challenge log row (reps, seconds, steps...) for a participant and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyLogEntry {
    #[schema(example = "1458306967016701974")]
    pub participant_id: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub log_date: NaiveDate,
    #[schema(example = 200)]
    pub amount: i64,
    #[schema(example = "morning set", nullable = true)]
    pub notes: Option<String>,
    #[schema(example = "2026-01-01T08:00:00Z", format = "date-time", value_type = String)]
    pub logged_at: DateTime<Utc>,
}
