use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

/// Header the chat gateway uses to pass the acting member's chat user id.
pub const PARTICIPANT_HEADER: &str = "X-Participant-Id";

/// The community member a command is issued for.
///
/// The gateway is trusted to fill the header; this is identification only.
pub struct Participant {
    pub id: String,
}

impl FromRequest for Participant {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let id = match req
            .headers()
            .get(PARTICIPANT_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
        {
            Some(id) if !id.is_empty() => id,
            _ => return ready(Err(ErrorUnauthorized("Missing participant id"))),
        };

        ready(Ok(Participant { id: id.to_string() }))
    }
}
