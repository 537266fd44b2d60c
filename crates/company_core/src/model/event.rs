//! Journal event model.
//!
//! # Invariants
//! - Events are immutable once written.
//! - `payload` is an opaque JSON snapshot; the journal never interprets it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type EventId = Uuid;

/// Kind of state change recorded by the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CompanyCreated,
    CompanyUpdated,
    CompanyDeleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompanyCreated => "company_created",
            Self::CompanyUpdated => "company_updated",
            Self::CompanyDeleted => "company_deleted",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted journal entry.
///
/// `event_type` is kept as text so rows written by other producers still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    /// Serialized JSON snapshot.
    pub payload: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Event {
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.payload)
    }
}
