use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::identity::Participant;
use crate::voting::DayOffService;
use crate::voting::service::LogOutcome;

#[derive(Deserialize, ToSchema)]
pub struct LogActivity {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = 200)]
    pub amount: i64,
    #[schema(example = "morning set", nullable = true)]
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ExemptionQuery {
    #[schema(example = "1458306967016701974")]
    /// Chat user id to check
    pub participant_id: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    /// Day to check
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct ExemptionResponse {
    #[schema(example = "1458306967016701974")]
    pub participant_id: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = true)]
    pub exempt: bool,
}

/// Log endpoint; skipped when an approved day-off covers the date
#[utoipa::path(
    post,
    path = "/api/log",
    params(
        ("X-Participant-Id" = String, Header, description = "Chat user id of the participant")
    ),
    request_body(content = LogActivity, content_type = "application/json"),
    responses(
        (status = 201, description = "Logged", body = Object, example = json!({
            "message": "Logged",
            "status": "logged",
            "entry": { "participant_id": "1458306967016701974", "log_date": "2026-01-01", "amount": 200, "notes": null, "logged_at": "2026-01-01T08:00:00Z" }
        })),
        (status = 200, description = "Approved day-off, nothing written", body = Object, example = json!({
            "message": "Approved day-off, no logging needed",
            "status": "exempt"
        })),
        (status = 400, description = "Negative amount"),
        (status = 401, description = "Missing participant id"),
        (status = 503, description = "Log store unavailable")
    ),
    tag = "Log"
)]
pub async fn log_activity(
    participant: Participant,
    service: web::Data<DayOffService>,
    payload: web::Json<LogActivity>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let outcome = service
        .log_activity(
            &participant.id,
            payload.date,
            payload.amount,
            payload.notes,
            Utc::now(),
        )
        .await
        .inspect_err(|e| {
            if e.is_transient() {
                tracing::error!(error = %e, participant_id = %participant.id, "Log write failed");
            }
        })?;

    Ok(match outcome {
        LogOutcome::Exempt => HttpResponse::Ok().json(serde_json::json!({
            "message": "Approved day-off, no logging needed",
            "status": "exempt"
        })),
        LogOutcome::Logged { entry } => HttpResponse::Created().json(serde_json::json!({
            "message": "Logged",
            "status": "logged",
            "entry": entry
        })),
    })
}

/// Exemption lookup for reminder and penalty schedulers
#[utoipa::path(
    get,
    path = "/api/exemptions",
    params(ExemptionQuery),
    responses(
        (status = 200, description = "Exemption state", body = ExemptionResponse)
    ),
    tag = "Log"
)]
pub async fn exemption(
    service: web::Data<DayOffService>,
    query: web::Query<ExemptionQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let exempt = service
        .has_approved_dayoff(&query.participant_id, query.date)
        .await;

    Ok(HttpResponse::Ok().json(ExemptionResponse {
        participant_id: query.participant_id,
        date: query.date,
        exempt,
    }))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::identity::PARTICIPANT_HEADER;
    use crate::model::day_off_request::VoteChoice;
    use crate::routes;
    use crate::voting::testing::Harness;
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use chrono::Utc;

    fn peer() -> std::net::SocketAddr {
        "127.0.0.1:40001".parse().unwrap()
    }

    #[actix_web::test]
    async fn approved_day_short_circuits_log() {
        let h = Harness::new(1);
        let today = Utc::now().date_naive();
        let req = h.service.create_request("alice", today, None, Utc::now()).await.unwrap();
        h.service
            .register_vote(req.id, "bob", VoteChoice::Yes, Utc::now())
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(h.service.clone()))
                .configure(|cfg| routes::configure(cfg, Config::default())),
        )
        .await;

        let log = test::TestRequest::post()
            .uri("/api/log")
            .peer_addr(peer())
            .insert_header((PARTICIPANT_HEADER, "carol"))
            .set_json(serde_json::json!({ "date": today.to_string(), "amount": 100 }))
            .to_request();
        let resp = test::call_service(&app, log).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "exempt");
        assert!(h.log_book.entries().await.is_empty());

        let other_day = today + chrono::Duration::days(1);
        let log = test::TestRequest::post()
            .uri("/api/log")
            .peer_addr(peer())
            .insert_header((PARTICIPANT_HEADER, "carol"))
            .set_json(serde_json::json!({ "date": other_day.to_string(), "amount": 100 }))
            .to_request();
        let resp = test::call_service(&app, log).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(h.log_book.entries().await.len(), 1);

        let check = test::TestRequest::get()
            .uri(&format!("/api/exemptions?participant_id=dave&date={}", today))
            .peer_addr(peer())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, check).await;
        assert_eq!(body["exempt"], true);
    }
}
