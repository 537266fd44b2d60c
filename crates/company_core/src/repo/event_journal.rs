//! Append-only event journal.
//!
//! # Responsibility
//! - Record typed state-change events on the caller's connection.
//! - Read journal entries back for audit.
//!
//! # Invariants
//! - The journal never opens, commits or rolls back transactions; writes land
//!   in whatever scope the caller passes in.
//! - Rows are never updated or deleted.
//! - Payloads are stored as given, without interpretation.

use crate::context::RequestContext;
use crate::db::NOW_MS_SQL;
use crate::error::{AppError, AppResult, ERR_UNEXPECTED_DATABASE, ERR_UNEXPECTED_EVENT};
use crate::model::event::{Event, EventId, EventKind};
use crate::repo::conflict::classify_error;
use log::error;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const EVENTS_DEFAULT_LIMIT: u32 = 50;
const EVENTS_LIMIT_MAX: u32 = 500;

/// Write side of the journal.
pub trait EventJournal: Send + Sync {
    /// Appends one event on `conn` and returns its id.
    fn store_event(
        &self,
        conn: &Connection,
        ctx: &RequestContext,
        kind: EventKind,
        payload: &str,
    ) -> AppResult<EventId>;
}

/// Query options for reading the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub kind: Option<EventKind>,
    /// Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
}

/// SQLite-backed journal over the `events` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEventJournal;

impl SqliteEventJournal {
    pub fn new() -> Self {
        Self
    }

    /// Lists events newest first.
    pub fn list_events(&self, conn: &Connection, query: &EventQuery) -> AppResult<Vec<Event>> {
        let mut sql = String::from(
            "SELECT id, event_type, payload, created_at, updated_at
             FROM events",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" WHERE event_type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_event_limit(
            query.limit,
        ))));

        let read = || -> rusqlite::Result<Vec<Event>> {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(parse_event_row(row)?);
            }
            Ok(events)
        };

        read().map_err(|err| classify_error(&err, ERR_UNEXPECTED_DATABASE))
    }
}

impl EventJournal for SqliteEventJournal {
    fn store_event(
        &self,
        conn: &Connection,
        ctx: &RequestContext,
        kind: EventKind,
        payload: &str,
    ) -> AppResult<EventId> {
        let id = Uuid::new_v4();
        let result = conn.execute(
            &format!(
                "INSERT INTO events (id, event_type, payload, created_at, updated_at)
                 VALUES (?1, ?2, ?3, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![id.to_string(), kind.as_str(), payload],
        );

        match result {
            Ok(_) => Ok(id),
            Err(err) => {
                error!(
                    "event=journal_store module=repo status=error request_id={} event_type={} error={}",
                    ctx.request_id(),
                    kind,
                    err
                );
                Err(classify_error(&err, ERR_UNEXPECTED_EVENT))
            }
        }
    }
}

/// Normalizes list limit according to the journal read contract.
pub fn normalize_event_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => EVENTS_DEFAULT_LIMIT,
        Some(value) if value > EVENTS_LIMIT_MAX => EVENTS_LIMIT_MAX,
        Some(value) => value,
    }
}

fn parse_event_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Event {
        id,
        event_type: row.get("event_type")?,
        payload: row.get("payload")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
