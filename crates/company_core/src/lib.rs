//! Core domain logic for the company registry.
//! This crate owns persistence, uniqueness and journaling rules for companies.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, DbConfig, JournalPolicy, LogConfig};
pub use context::RequestContext;
pub use db::{DbError, DbHealth, HealthStatus, Store};
pub use error::{AppError, AppResult, ErrorKind};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::company::{Company, CompanyId, CompanyType, CompanyValidationError, NewCompany};
pub use model::event::{Event, EventId, EventKind};
pub use model::patch::{CompanyField, CompanyPatch, PatchValue};
pub use repo::company_repo::{CompanyRepository, SqliteCompanyRepository};
pub use repo::event_journal::{EventJournal, EventQuery, SqliteEventJournal};
pub use service::company_service::{CompanyService, CreateCompanyRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
