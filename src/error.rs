//! HTTP error taxonomy
//!
//! Every failure a handler can produce maps onto one of these variants.
//! Clients only ever see the generic message; OS errors and token
//! rejection reasons stay in the server log.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid or expired URL")]
    Forbidden,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("{0}")]
    Internal(&'static str),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Forbidden => json!({ "error": "Invalid or expired URL" }),
            ApiError::PayloadTooLarge { .. } => json!({ "message": "File too large." }),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                json!({ "message": msg })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
