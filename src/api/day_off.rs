use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::DayOffError;
use crate::identity::Participant;
use crate::model::day_off_request::{DayOffRequest, RetractOutcome, VoteChoice, VoteOutcome};
use crate::voting::DayOffService;
use crate::voting::service::VoteReceipt;

#[derive(Deserialize, ToSchema)]
pub struct CreateDayOff {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub target_date: chrono::NaiveDate,
    #[schema(example = "Family trip", nullable = true)]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CastVote {
    /// yes or no
    #[schema(example = "yes")]
    pub vote: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AttachMessage {
    #[schema(example = "1201938475610293847")]
    pub message_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReactionEvent {
    #[schema(example = "1201938475610293847")]
    pub message_id: String,
    #[schema(example = "✅")]
    pub emoji: String,
    /// false when the reaction was removed
    #[schema(example = true)]
    pub added: bool,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct DayOffFilter {
    #[schema(example = "open")]
    /// Filter by state: open, approved or rejected
    pub status: Option<String>,
    #[schema(example = "1458306967016701974")]
    /// Filter by requester
    pub requested_by: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct DayOffListResponse {
    pub data: Vec<DayOffRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Create day-off request
========================= */
#[utoipa::path(
    post,
    path = "/api/dayoff",
    request_body(
        content = CreateDayOff,
        description = "Day-off request payload",
        content_type = "application/json"
    ),
    params(
        ("X-Participant-Id" = String, Header, description = "Chat user id of the requester")
    ),
    responses(
        (status = 201, description = "Day-off request created", body = Object, example = json!({
            "message": "Day-off request created, ask participants to vote",
            "request": { "id": 1, "target_date": "2026-01-01", "deadline": "2026-01-01T12:00:00Z" }
        })),
        (status = 400, description = "Target date in the past"),
        (status = 401, description = "Missing participant id"),
        (status = 503, description = "Vote store unavailable")
    ),
    tag = "DayOff"
)]
pub async fn create_dayoff(
    participant: Participant,
    service: web::Data<DayOffService>,
    payload: web::Json<CreateDayOff>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let request = service
        .create_request(&participant.id, payload.target_date, payload.reason, Utc::now())
        .await
        .inspect_err(|e| {
            if e.is_transient() {
                tracing::error!(error = %e, requested_by = %participant.id, "Failed to create day-off request");
            }
        })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Day-off request created, ask participants to vote",
        "request": request
    })))
}

/* =========================
Vote on a request
========================= */
#[utoipa::path(
    post,
    path = "/api/dayoff/{request_id}/vote",
    params(
        ("request_id" = u64, Path, description = "ID of the day-off request"),
        ("X-Participant-Id" = String, Header, description = "Chat user id of the voter")
    ),
    request_body(content = CastVote, content_type = "application/json"),
    responses(
        (status = 200, description = "Vote recorded or changed", body = Object, example = json!({
            "message": "Vote recorded",
            "receipt": { "request_id": 1, "outcome": "recorded", "tally": { "yes": 1, "no": 0 }, "closed": false, "result": "unresolved" }
        })),
        (status = 400, description = "Vote must be yes or no"),
        (status = 404, description = "Day-off request not found"),
        (status = 409, description = "Voting is closed")
    ),
    tag = "DayOff"
)]
pub async fn cast_vote(
    participant: Participant,
    service: web::Data<DayOffService>,
    path: web::Path<u64>,
    payload: web::Json<CastVote>,
) -> actix_web::Result<impl Responder> {
    let request_id = path.into_inner();
    let choice = VoteChoice::parse(&payload.vote)?;

    let receipt = service
        .register_vote(request_id, &participant.id, choice, Utc::now())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": vote_message(&receipt),
        "receipt": receipt
    })))
}

fn vote_message(receipt: &VoteReceipt) -> &'static str {
    match (receipt.outcome, receipt.closed) {
        (VoteOutcome::Recorded, false) => "Vote recorded",
        (VoteOutcome::Changed, false) => "Vote changed",
        (_, true) => "Vote recorded, voting is now closed",
    }
}

/* =========================
Retract a vote
========================= */
#[utoipa::path(
    delete,
    path = "/api/dayoff/{request_id}/vote",
    params(
        ("request_id" = u64, Path, description = "ID of the day-off request"),
        ("X-Participant-Id" = String, Header, description = "Chat user id of the voter")
    ),
    responses(
        (status = 200, description = "Vote retracted", body = Object, example = json!({
            "message": "Vote retracted",
            "outcome": "retracted"
        })),
        (status = 404, description = "Day-off request not found"),
        (status = 409, description = "Voting is closed")
    ),
    tag = "DayOff"
)]
pub async fn retract_vote(
    participant: Participant,
    service: web::Data<DayOffService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let outcome = service
        .retract_vote(path.into_inner(), &participant.id, Utc::now())
        .await?;

    let message = match outcome {
        RetractOutcome::Retracted => "Vote retracted",
        RetractOutcome::NotVoted => "You have not voted on this request",
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": message,
        "outcome": outcome
    })))
}

/// for getting a day-off request with its current tally
#[utoipa::path(
    get,
    path = "/api/dayoff/{request_id}",
    params(
        ("request_id" = u64, Path, description = "ID of the day-off request")
    ),
    responses(
        (status = 200, description = "Day-off request found", body = crate::voting::service::VoteStatus),
        (status = 404, description = "Day-off request not found", body = Object, example = json!({
            "message": "Day-off request 1 not found"
        }))
    ),
    tag = "DayOff"
)]
pub async fn get_dayoff(
    service: web::Data<DayOffService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let status = service.status(path.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// for getting day-off requests endpoint
#[utoipa::path(
    get,
    path = "/api/dayoff",
    params(DayOffFilter),
    responses(
        (status = 200, description = "Paginated day-off list", body = DayOffListResponse),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "DayOff"
)]
pub async fn dayoff_list(
    service: web::Data<DayOffService>,
    query: web::Query<DayOffFilter>,
) -> actix_web::Result<impl Responder> {
    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let status = query.status.as_deref().map(str::to_lowercase);
    if let Some(s) = status.as_deref() {
        if !matches!(s, "open" | "approved" | "rejected") {
            return Err(DayOffError::InvalidInput(
                "status must be open, approved or rejected".to_string(),
            )
            .into());
        }
    }

    let mut records: Vec<DayOffRequest> = service
        .list()
        .await?
        .into_iter()
        .filter(|r| status.as_deref().is_none_or(|s| r.state_label() == s))
        .filter(|r| {
            query
                .requested_by
                .as_deref()
                .is_none_or(|by| r.requested_by == by)
        })
        .collect();
    records.sort_by(|a, b| b.id.cmp(&a.id));

    let total = records.len() as i64;
    let data = records
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();

    Ok(HttpResponse::Ok().json(DayOffListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Bind the vote prompt message
========================= */
#[utoipa::path(
    put,
    path = "/api/dayoff/{request_id}/message",
    params(
        ("request_id" = u64, Path, description = "ID of the day-off request")
    ),
    request_body(content = AttachMessage, content_type = "application/json"),
    responses(
        (status = 200, description = "Message bound", body = DayOffRequest),
        (status = 404, description = "Day-off request not found")
    ),
    tag = "DayOff"
)]
pub async fn attach_message(
    service: web::Data<DayOffService>,
    path: web::Path<u64>,
    payload: web::Json<AttachMessage>,
) -> actix_web::Result<impl Responder> {
    let request = service
        .attach_message(path.into_inner(), &payload.message_id)
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Reaction added/removed on a vote prompt
========================= */
#[utoipa::path(
    post,
    path = "/api/reactions",
    params(
        ("X-Participant-Id" = String, Header, description = "Chat user id of the reacting member")
    ),
    request_body(content = ReactionEvent, content_type = "application/json"),
    responses(
        (status = 200, description = "Reaction applied or ignored", body = crate::voting::service::ReactionOutcome),
        (status = 409, description = "Voting is closed")
    ),
    tag = "DayOff"
)]
pub async fn reaction(
    participant: Participant,
    service: web::Data<DayOffService>,
    payload: web::Json<ReactionEvent>,
) -> actix_web::Result<impl Responder> {
    let outcome = service
        .react(
            &payload.message_id,
            &participant.id,
            &payload.emoji,
            payload.added,
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
