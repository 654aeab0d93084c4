//! Error type shared by every API handler.
//!
//! Handlers return [`ApiResult`]; any [`ApiError`] is rendered as the matching
//! HTTP status with a `{ "error": "<message>" }` body. Internal failures are
//! logged with their detail and reported to the client with a generic message.

use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, status};
use rocket::serde::json::{Json, json};
use thiserror::Error;

use crate::models::ParseEnumError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The payload is logged, never sent.
    #[error("Error processing the request")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        ApiError::Internal(format!("database error: {e}"))
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(e: ParseEnumError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(format!("io error: {e}"))
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if let ApiError::Internal(detail) = &self {
            error!(
                "{} {} failed: {}",
                req.method().as_str(),
                req.uri().path(),
                detail
            );
        }
        let body = Json(json!({ "error": self.to_string() }));
        status::Custom(self.status(), body).respond_to(req)
    }
}

/// Parses an id taken from the request path.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id")))
}
