use crate::{
    api::{daily_log, day_off},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .expect("limiter period and burst are non-zero");
        Governor::new(&cfg)
    }

    let vote_limiter = Arc::new(build_limiter(config.rate_vote_per_min));
    let api_limiter = Arc::new(build_limiter(config.rate_api_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(api_limiter)
            .service(
                web::scope("/dayoff")
                    // /dayoff
                    .service(
                        web::resource("")
                            .route(web::get().to(day_off::dayoff_list))
                            .route(web::post().to(day_off::create_dayoff)),
                    )
                    // /dayoff/{id}
                    .service(web::resource("/{id}").route(web::get().to(day_off::get_dayoff)))
                    // /dayoff/{id}/vote
                    .service(
                        web::resource("/{id}/vote")
                            .wrap(vote_limiter.clone())
                            .route(web::post().to(day_off::cast_vote))
                            .route(web::delete().to(day_off::retract_vote)),
                    )
                    // /dayoff/{id}/message
                    .service(
                        web::resource("/{id}/message")
                            .route(web::put().to(day_off::attach_message)),
                    ),
            )
            .service(
                web::resource("/reactions")
                    .wrap(vote_limiter)
                    .route(web::post().to(day_off::reaction)),
            )
            .service(web::resource("/log").route(web::post().to(daily_log::log_activity)))
            .service(web::resource("/exemptions").route(web::get().to(daily_log::exemption))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PARTICIPANT_HEADER;
    use crate::voting::testing::Harness;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn vote_and_reaction_routes_share_one_budget() {
        let h = Harness::new(3);
        let config = Config {
            rate_vote_per_min: 1,
            ..Config::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(h.service.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;
        let peer: std::net::SocketAddr = "127.0.0.1:40002".parse().unwrap();

        let vote = test::TestRequest::post()
            .uri("/api/dayoff/1/vote")
            .peer_addr(peer)
            .insert_header((PARTICIPANT_HEADER, "bob"))
            .set_json(serde_json::json!({ "vote": "yes" }))
            .to_request();
        let resp = test::call_service(&app, vote).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let reaction = test::TestRequest::post()
            .uri("/api/reactions")
            .peer_addr(peer)
            .insert_header((PARTICIPANT_HEADER, "bob"))
            .set_json(serde_json::json!({ "message_id": "m", "emoji": "✅", "added": true }))
            .to_request();
        // the limiter rejects through the error path
        let status = match test::try_call_service(&app, reaction).await {
            Ok(resp) => resp.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let list = test::TestRequest::get()
            .uri("/api/dayoff")
            .peer_addr(peer)
            .to_request();
        let resp = test::call_service(&app, list).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
