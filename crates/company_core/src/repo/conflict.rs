//! Classification of storage errors into application errors.
//!
//! # Invariants
//! - Unique-constraint violations become `Conflict`; they are never logged as
//!   failures because they are an expected race outcome.
//! - Every other store error becomes `Internal` with the store detail kept
//!   out of the user message.

use crate::context::RequestContext;
use crate::error::{AppError, ERR_UNEXPECTED_DATABASE};
use rusqlite::{ffi, ErrorCode};

pub const ID_CONFLICT_MESSAGE: &str = "company with this id already exists";
pub const DEADLINE_EXCEEDED: &str = "request deadline exceeded";

/// Outcome of inspecting a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    UniqueViolation,
    PrimaryKeyViolation,
    Interrupted,
    Busy,
    Other,
}

/// Reads the extended result code carried by a rusqlite error.
pub fn inspect(err: &rusqlite::Error) -> StoreFailure {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE => StoreFailure::UniqueViolation,
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY => StoreFailure::PrimaryKeyViolation,
            ffi::SQLITE_INTERRUPT => StoreFailure::Interrupted,
            _ if failure.code == ErrorCode::DatabaseBusy => StoreFailure::Busy,
            _ => StoreFailure::Other,
        },
        _ => StoreFailure::Other,
    }
}

/// Maps a write-path error to `Conflict` (with `conflict_message`) or
/// `Internal`.
pub fn classify_write_error(err: &rusqlite::Error, conflict_message: &str) -> AppError {
    match inspect(err) {
        StoreFailure::UniqueViolation => AppError::conflict(conflict_message),
        StoreFailure::PrimaryKeyViolation => AppError::conflict(ID_CONFLICT_MESSAGE),
        StoreFailure::Interrupted => AppError::internal(ERR_UNEXPECTED_DATABASE, DEADLINE_EXCEEDED),
        StoreFailure::Busy | StoreFailure::Other => AppError::internal(ERR_UNEXPECTED_DATABASE, err),
    }
}

/// Maps an error where no constraint can fire to `Internal`.
pub fn classify_error(err: &rusqlite::Error, context: &str) -> AppError {
    match inspect(err) {
        StoreFailure::Interrupted => AppError::internal(context, DEADLINE_EXCEEDED),
        _ => AppError::internal(context, err),
    }
}

/// Like [`classify_error`], but a lock wait that gave up because the request
/// deadline passed is reported as the deadline.
pub fn classify_timed_error(
    err: &rusqlite::Error,
    context: &str,
    ctx: &RequestContext,
) -> AppError {
    if inspect(err) == StoreFailure::Busy && ctx.is_expired() {
        return AppError::internal(context, DEADLINE_EXCEEDED);
    }
    classify_error(err, context)
}
