use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use super::errors::ErrorBody;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The acting user. Authentication happens upstream; the id is trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing X-User-Id header")]
    Missing,

    #[error("Malformed X-User-Id header")]
    Malformed,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(ErrorBody {
            code: "not_authenticated",
            message: self.to_string(),
            fields: None,
        })
    }
}

fn current_user(req: &HttpRequest) -> Result<CurrentUser, AuthError> {
    let value = req.headers().get(USER_ID_HEADER).ok_or(AuthError::Missing)?;
    let text = value.to_str().map_err(|_| AuthError::Malformed)?;
    Uuid::parse_str(text.trim())
        .map(CurrentUser)
        .map_err(|_| AuthError::Malformed)
}

impl FromRequest for CurrentUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(current_user(req))
    }
}
