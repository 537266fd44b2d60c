//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must validate input before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) and
//!   classify store errors once, at the point of failure.

pub mod company_repo;
pub mod conflict;
pub mod event_journal;
pub mod update_query;
