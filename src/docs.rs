use crate::api::daily_log::{ExemptionQuery, ExemptionResponse, LogActivity};
use crate::api::day_off::{
    AttachMessage, CastVote, CreateDayOff, DayOffFilter, DayOffListResponse, ReactionEvent,
};
use crate::model::daily_log::DailyLogEntry;
use crate::model::day_off_request::{
    DayOffRequest, RetractOutcome, Tally, VoteChoice, VoteOutcome, VoteResult,
};
use crate::voting::service::{ReactionOutcome, VoteReceipt, VoteStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Day-off Vote API",
        version = "1.0.0",
        description = r#"
## Community day-off voting

Members of a fitness challenge community ask the group for a day off from the daily
logging requirement. Everyone votes yes or no, either through the API or by reacting
to the request message in chat.

### Closing rules
- A request is **approved** as soon as it reaches the yes-vote threshold
- Otherwise it closes at its deadline and is **rejected**
- Every closed request is announced exactly once in the results channel

### Logging
While an approved day-off covers a date, `POST /api/log` is skipped for covered members
and `GET /api/exemptions` reports them as exempt.

### Identity
The chat gateway passes the acting member's chat user id in the `X-Participant-Id` header.
"#,
    ),
    paths(
        crate::api::day_off::create_dayoff,
        crate::api::day_off::dayoff_list,
        crate::api::day_off::get_dayoff,
        crate::api::day_off::cast_vote,
        crate::api::day_off::retract_vote,
        crate::api::day_off::attach_message,
        crate::api::day_off::reaction,

        crate::api::daily_log::log_activity,
        crate::api::daily_log::exemption
    ),
    components(
        schemas(
            CreateDayOff,
            CastVote,
            AttachMessage,
            ReactionEvent,
            DayOffFilter,
            DayOffListResponse,
            DayOffRequest,
            VoteChoice,
            VoteResult,
            VoteOutcome,
            RetractOutcome,
            Tally,
            VoteReceipt,
            VoteStatus,
            ReactionOutcome,
            LogActivity,
            ExemptionQuery,
            ExemptionResponse,
            DailyLogEntry
        )
    ),
    tags(
        (name = "DayOff", description = "Day-off requests and voting"),
        (name = "Log", description = "Daily activity logging and exemptions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_response_schemas() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/dayoff/{request_id}"));
        assert!(doc.paths.paths.contains_key("/api/reactions"));

        let schemas = &doc.components.expect("components").schemas;
        assert!(schemas.contains_key("VoteStatus"));
        assert!(schemas.contains_key("ReactionOutcome"));
        assert!(schemas.contains_key("DailyLogEntry"));
    }
}
