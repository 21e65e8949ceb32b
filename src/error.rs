use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::service::ServiceError;

/// Client-visible failures.
///
/// Domain failures answer 200 with a plain-text message; existing clients
/// tell outcomes apart by body text, not status. Only unexpected backend
/// failures use a 5xx.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Missing required field(s)")] MissingFields,
    #[error("Invalid Thread Id provided")] InvalidThreadId,
    #[error("Invalid reply Id provided")] InvalidReplyId,
    #[error("incorrect password")] IncorrectPassword,
    #[error("internal error")] Internal,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::MissingFields => ApiError::MissingFields,
            ServiceError::ThreadNotFound => ApiError::InvalidThreadId,
            ServiceError::ReplyNotFound => ApiError::InvalidReplyId,
            ServiceError::IncorrectPassword => ApiError::IncorrectPassword,
            ServiceError::Store(e) => {
                tracing::error!("store failure: {e}");
                ApiError::Internal
            }
            ServiceError::Password(e) => {
                tracing::error!("password backend failure: {e}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}
