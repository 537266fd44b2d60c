//! Application error returned by repository and service operations.
//!
//! # Responsibility
//! - Carry a stable error kind plus a short user-facing message.
//! - Keep internal detail (store errors, SQL failures) for server-side logs.
//!
//! # Invariants
//! - `message()` never contains internal detail.
//! - `Internal` errors always present the same generic user message.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AppResult<T> = Result<T, AppError>;

pub const ERR_UNEXPECTED_DATABASE: &str = "unexpected database error";
pub const ERR_TX_BEGIN: &str = "failed to begin transaction";
pub const ERR_TX_COMMIT: &str = "failed to commit transaction";
pub const ERR_TX_ROLLBACK: &str = "failed to rollback transaction";
pub const ERR_UNEXPECTED_EVENT: &str = "unexpected event journal error";

const INTERNAL_USER_MESSAGE: &str = "An unexpected error occurred";

/// Error class, mirrored onto HTTP-style status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

/// Tagged application error.
///
/// `Display` renders only the user-facing message; use [`AppError::detailed`]
/// for log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    internal: Option<String>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Builds an internal error. `context` and `err` are kept for logging only;
    /// the user-facing message is fixed.
    pub fn internal(context: &str, err: impl Display) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: INTERNAL_USER_MESSAGE.to_string(),
            internal: Some(format!("{context}: {err}")),
        }
    }

    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// User-facing message, safe to return to callers.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message plus internal detail, for server-side logs.
    pub fn detailed(&self) -> String {
        match &self.internal {
            Some(internal) => format!("{}: {internal}", self.message),
            None => self.message.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for AppError {}

#[cfg(test)]
mod tests {
    use super::{AppError, ErrorKind};

    #[test]
    fn internal_error_hides_detail_from_user_message() {
        let err = AppError::internal("unexpected database error", "disk I/O error");

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "An unexpected error occurred");
        assert!(!err.message().contains("disk"));
        assert!(err.detailed().contains("disk I/O error"));
    }

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(AppError::bad_request("x").status_code(), 400);
        assert_eq!(AppError::not_found("x").status_code(), 404);
        assert_eq!(AppError::conflict("x").status_code(), 409);
    }
}
