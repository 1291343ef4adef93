//! Error type shared by the services and the HTTP layer.

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder, Response};
use rocket::Request;
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;

use crate::readings::ReadingBreach;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input
    #[error("validation failed: {0}")]
    Validation(String),

    /// One or more readings fell outside their configured range
    #[error("{} reading(s) out of range", .0.len())]
    OutOfRange(Vec<ReadingBreach>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Unexpected(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation<T: std::fmt::Display>(msg: T) -> Self {
        ServiceError::Validation(msg.to_string())
    }

    pub fn not_found<T: std::fmt::Display>(what: T) -> Self {
        ServiceError::NotFound(what.to_string())
    }

    pub fn status(&self) -> Status {
        match self {
            ServiceError::Validation(_) | ServiceError::OutOfRange(_) => Status::BadRequest,
            ServiceError::NotFound(_) => Status::NotFound,
            ServiceError::Conflict(_) => Status::Conflict,
            ServiceError::Unauthorized(_) => Status::Unauthorized,
            ServiceError::Database(_) | ServiceError::Pool(_) | ServiceError::Unexpected(_) => {
                Status::InternalServerError
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_failed",
            ServiceError::OutOfRange(_) => "out_of_range",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Database(_) | ServiceError::Pool(_) | ServiceError::Unexpected(_) => "unexpected",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            ServiceError::OutOfRange(breaches) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "action_required": "out_of_range",
                "breaches": breaches,
            }),
            // Internal details stay in the log
            ServiceError::Database(_) | ServiceError::Pool(_) | ServiceError::Unexpected(_) => json!({
                "error": self.code(),
                "message": "internal server error",
            }),
            _ => json!({
                "error": self.code(),
                "message": self.to_string(),
            }),
        }
    }
}

impl From<crate::schedule::ParseEnumError> for ServiceError {
    fn from(e: crate::schedule::ParseEnumError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Unexpected(format!("json: {}", e))
    }
}

impl<'r> Responder<'r, 'static> for ServiceError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            log::error!("{} {} failed: {}", req.method(), req.uri(), self);
        } else {
            log::info!("{} {} rejected: {}", req.method(), req.uri(), self);
        }

        let body = self.body().to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
