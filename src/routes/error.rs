use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::Header;
use rocket::response::Responder;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, catch};

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Not found".to_string(),
    })
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Conflict".to_string(),
    })
}

/// 429 body carrying the Retry-After hint computed by the rate limiter.
pub struct TooManyRequests {
    retry_after_secs: u64,
}

impl<'r> Responder<'r, 'static> for TooManyRequests {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let body = Json(Error {
            message: "Too many requests".to_string(),
        });

        let mut response = body.respond_to(req)?;
        response.set_status(rocket::http::Status::TooManyRequests);
        response.set_header(Header::new("Retry-After", self.retry_after_secs.to_string()));
        Ok(response)
    }
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    let retry_after_secs = req
        .local_cache(|| None::<RateLimitRetryAfter>)
        .as_ref()
        .map(|r| r.0)
        .unwrap_or(60);

    TooManyRequests { retry_after_secs }
}
