//! Domain model for the company registry.
//!
//! # Responsibility
//! - Define the company aggregate, its partial-update input and journal events.
//!
//! # Invariants
//! - Every company is identified by a writer-assigned `CompanyId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod company;
pub mod event;
pub mod patch;
