use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;

/// Failures surfaced by the day-off voting core.
///
/// User errors (`RequestNotFound`, `VotingClosed`, `InvalidInput`) are reported
/// back to the caller only. Infra errors (`StoreUnavailable`,
/// `AnnouncementFailed`) are logged and retried by the next sweep.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum DayOffError {
    #[display(fmt = "Day-off request {} not found", _0)]
    RequestNotFound(u64),

    #[display(fmt = "Voting is closed for request {}", _0)]
    VotingClosed(u64),

    #[display(fmt = "Vote store unavailable: {}", _0)]
    StoreUnavailable(String),

    #[display(fmt = "Request {} was modified concurrently, try again", _0)]
    StaleWrite(u64),

    #[display(fmt = "{}", _0)]
    InvalidInput(String),

    #[display(fmt = "Announcement failed: {}", _0)]
    AnnouncementFailed(String),
}

impl std::error::Error for DayOffError {}

impl DayOffError {
    /// Transient failures that the sweeper will retry on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DayOffError::StoreUnavailable(_) | DayOffError::AnnouncementFailed(_)
        )
    }
}

impl From<sqlx::Error> for DayOffError {
    fn from(e: sqlx::Error) -> Self {
        DayOffError::StoreUnavailable(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for DayOffError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DayOffError::StoreUnavailable("store call timed out".to_string())
    }
}

impl ResponseError for DayOffError {
    fn status_code(&self) -> StatusCode {
        match self {
            DayOffError::RequestNotFound(_) => StatusCode::NOT_FOUND,
            DayOffError::VotingClosed(_) | DayOffError::StaleWrite(_) => StatusCode::CONFLICT,
            DayOffError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DayOffError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DayOffError::AnnouncementFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // infra details stay in the logs
        let message = match self {
            DayOffError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            DayOffError::AnnouncementFailed(_) => "Announcement could not be delivered".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "message": message }))
    }
}
