//! Company repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/soft-delete over the `companies` table.
//! - Journal every successful mutation in the same transaction.
//! - Translate store failures into [`AppError`] exactly once.
//!
//! # Invariants
//! - Every mutation runs in one `IMMEDIATE` transaction scope that is rolled
//!   back on every exit path that did not commit.
//! - Names are unique case-insensitively (Unicode lowercase of the trimmed
//!   name, stored as `name_key`) across all rows, deleted or not: checked
//!   before insert and enforced by the unique index.
//! - Soft-deleted rows are invisible to `find_by_id`, `update` and `delete`.
//! - `updated_at` strictly increases on every update.

use crate::config::JournalPolicy;
use crate::context::RequestContext;
use crate::db::{DeadlineGuard, PooledConnection, Store, TxScope, NOW_MS_SQL};
use crate::error::{
    AppError, AppResult, ErrorKind, ERR_TX_BEGIN, ERR_TX_COMMIT, ERR_UNEXPECTED_DATABASE,
    ERR_UNEXPECTED_EVENT,
};
use crate::model::company::{name_key, Company, CompanyId, CompanyType, NewCompany};
use crate::model::event::EventKind;
use crate::model::patch::CompanyPatch;
use crate::repo::conflict::{classify_timed_error, classify_write_error, DEADLINE_EXCEEDED};
use crate::repo::event_journal::{EventJournal, SqliteEventJournal};
use crate::repo::update_query::build_update_assignments;
use log::{debug, error, info};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::time::Instant;
use uuid::Uuid;

const COMPANY_COLUMNS: &str = "id,
    name,
    description,
    amount_of_employees,
    registered,
    type,
    created_at,
    updated_at,
    deleted_at";

pub const NAME_CONFLICT_MESSAGE: &str = "company with this name already exists";
pub const NOT_FOUND_MESSAGE: &str = "company not found";
pub const DELETED_MESSAGE: &str = "company has been deleted, please contact support";
pub const DELETE_NOT_FOUND_MESSAGE: &str = "company not found or already deleted";
pub const EMPTY_PATCH_MESSAGE: &str = "no fields to update";

/// Capability set over the company aggregate.
pub trait CompanyRepository: Send + Sync {
    /// Persists a new company and journals `company_created`.
    fn create(&self, ctx: &RequestContext, company: &NewCompany) -> AppResult<Company>;
    /// Loads a live company.
    fn find_by_id(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<Company>;
    /// Applies a partial update and journals `company_updated`.
    fn update(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> AppResult<Company>;
    /// Soft-deletes a live company and journals `company_deleted`.
    fn delete(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<()>;
}

/// SQLite-backed company repository.
pub struct SqliteCompanyRepository<J = SqliteEventJournal> {
    store: Store,
    journal: J,
    journal_policy: JournalPolicy,
}

impl SqliteCompanyRepository<SqliteEventJournal> {
    pub fn new(store: Store) -> Self {
        Self::with_journal(store, SqliteEventJournal::new())
    }
}

impl<J: EventJournal> SqliteCompanyRepository<J> {
    pub fn with_journal(store: Store, journal: J) -> Self {
        Self {
            store,
            journal,
            journal_policy: JournalPolicy::default(),
        }
    }

    pub fn with_journal_policy(mut self, policy: JournalPolicy) -> Self {
        self.journal_policy = policy;
        self
    }

    pub fn journal_policy(&self) -> JournalPolicy {
        self.journal_policy
    }

    fn acquire(&self, ctx: &RequestContext, op: &str) -> AppResult<PooledConnection> {
        if ctx.is_expired() {
            return Err(log_internal(
                ctx,
                op,
                AppError::internal(ERR_UNEXPECTED_DATABASE, DEADLINE_EXCEEDED),
            ));
        }
        self.store.connection(ctx).map_err(|err| {
            log_internal(ctx, op, AppError::internal(ERR_UNEXPECTED_DATABASE, err))
        })
    }

    /// Serializes `company` and hands it to the journal on the transaction.
    ///
    /// Failures are logged by the journal; the journal policy decides whether
    /// they abort the mutation.
    fn journal_change(
        &self,
        conn: &Connection,
        ctx: &RequestContext,
        kind: EventKind,
        company: &Company,
    ) -> AppResult<()> {
        let result = serde_json::to_string(company)
            .map_err(|err| AppError::internal(ERR_UNEXPECTED_EVENT, err))
            .and_then(|payload| self.journal.store_event(conn, ctx, kind, &payload));

        match (result, self.journal_policy) {
            (Ok(_), _) => Ok(()),
            (Err(err), JournalPolicy::BestEffort) => {
                error!(
                    "event=journal_skip module=repo status=error request_id={} event_type={} company_id={} error={}",
                    ctx.request_id(),
                    kind,
                    company.id,
                    err.detailed()
                );
                Ok(())
            }
            (Err(err), JournalPolicy::Required) => Err(log_internal(ctx, kind.as_str(), err)),
        }
    }
}

impl<J: EventJournal> CompanyRepository for SqliteCompanyRepository<J> {
    fn create(&self, ctx: &RequestContext, company: &NewCompany) -> AppResult<Company> {
        const OP: &str = "company_create";
        let started_at = Instant::now();

        company
            .validate()
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        let conn = self.acquire(ctx, OP)?;
        let tx = TxScope::begin(&conn, ctx, self.store.lock_wait())
            .map_err(|err| fail(ctx, OP, ERR_TX_BEGIN, &err))?;
        let _deadline = DeadlineGuard::arm(&conn, ctx);
        let name = company.name.trim();
        let key = name_key(name);

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM companies
                    WHERE name_key = ?1
                );",
                [&key],
                |row| row.get(0),
            )
            .map_err(|err| fail(ctx, OP, ERR_UNEXPECTED_DATABASE, &err))?;
        if exists {
            debug!(
                "event={OP} module=repo status=conflict stage=precheck request_id={}",
                ctx.request_id()
            );
            return Err(AppError::conflict(NAME_CONFLICT_MESSAGE));
        }

        let created = tx
            .query_row(
                &format!(
                    "INSERT INTO companies (
                        id,
                        name,
                        name_key,
                        description,
                        amount_of_employees,
                        registered,
                        type,
                        created_at,
                        updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW_MS_SQL}, {NOW_MS_SQL})
                    RETURNING {COMPANY_COLUMNS};"
                ),
                params![
                    company.id.to_string(),
                    name,
                    key,
                    company.description.as_deref(),
                    i64::from(company.amount_of_employees),
                    company.registered,
                    company.kind.as_str(),
                ],
                parse_company_row,
            )
            .map_err(|err| fail_write(ctx, OP, &err))?;

        self.journal_change(&tx, ctx, EventKind::CompanyCreated, &created)?;
        tx.commit()
            .map_err(|err| fail(ctx, OP, ERR_TX_COMMIT, &err))?;

        info!(
            "event={OP} module=repo status=ok request_id={} company_id={} duration_ms={}",
            ctx.request_id(),
            created.id,
            started_at.elapsed().as_millis()
        );
        Ok(created)
    }

    fn find_by_id(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<Company> {
        const OP: &str = "company_find";

        let conn = self.acquire(ctx, OP)?;
        let _deadline = DeadlineGuard::arm(&conn, ctx);

        let found = conn
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS}
                     FROM companies
                     WHERE id = ?1;"
                ),
                [id.to_string()],
                parse_company_row,
            )
            .optional()
            .map_err(|err| fail(ctx, OP, ERR_UNEXPECTED_DATABASE, &err))?;

        match found {
            None => Err(AppError::not_found(NOT_FOUND_MESSAGE)),
            Some(company) if !company.is_active() => Err(AppError::not_found(DELETED_MESSAGE)),
            Some(company) => Ok(company),
        }
    }

    fn update(
        &self,
        ctx: &RequestContext,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> AppResult<Company> {
        const OP: &str = "company_update";
        let started_at = Instant::now();

        if patch.is_empty() {
            return Err(AppError::bad_request(EMPTY_PATCH_MESSAGE));
        }
        patch
            .validate()
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        let (assignments, mut args) = build_update_assignments(patch);
        let id_placeholder = args.len() + 1;
        args.push(Value::Text(id.to_string()));
        let sql = format!(
            "UPDATE companies
             SET {assignments},
                 updated_at = MAX({NOW_MS_SQL}, updated_at + 1)
             WHERE id = ?{id_placeholder}
               AND deleted_at IS NULL
             RETURNING {COMPANY_COLUMNS};"
        );

        let conn = self.acquire(ctx, OP)?;
        let tx = TxScope::begin(&conn, ctx, self.store.lock_wait())
            .map_err(|err| fail(ctx, OP, ERR_TX_BEGIN, &err))?;
        let _deadline = DeadlineGuard::arm(&conn, ctx);

        let updated = tx
            .query_row(&sql, params_from_iter(args.iter()), parse_company_row)
            .optional()
            .map_err(|err| fail_write(ctx, OP, &err))?;
        let Some(updated) = updated else {
            return Err(AppError::not_found(NOT_FOUND_MESSAGE));
        };

        self.journal_change(&tx, ctx, EventKind::CompanyUpdated, &updated)?;
        tx.commit()
            .map_err(|err| fail(ctx, OP, ERR_TX_COMMIT, &err))?;

        info!(
            "event={OP} module=repo status=ok request_id={} company_id={} fields={} duration_ms={}",
            ctx.request_id(),
            updated.id,
            patch
                .fields()
                .map(|field| field.column())
                .collect::<Vec<_>>()
                .join(","),
            started_at.elapsed().as_millis()
        );
        Ok(updated)
    }

    fn delete(&self, ctx: &RequestContext, id: CompanyId) -> AppResult<()> {
        const OP: &str = "company_delete";
        let started_at = Instant::now();

        let conn = self.acquire(ctx, OP)?;
        let tx = TxScope::begin(&conn, ctx, self.store.lock_wait())
            .map_err(|err| fail(ctx, OP, ERR_TX_BEGIN, &err))?;
        let _deadline = DeadlineGuard::arm(&conn, ctx);

        let deleted = tx
            .query_row(
                &format!(
                    "UPDATE companies
                     SET deleted_at = {NOW_MS_SQL}
                     WHERE id = ?1
                       AND deleted_at IS NULL
                     RETURNING {COMPANY_COLUMNS};"
                ),
                [id.to_string()],
                parse_company_row,
            )
            .optional()
            .map_err(|err| fail(ctx, OP, ERR_UNEXPECTED_DATABASE, &err))?;
        let Some(deleted) = deleted else {
            return Err(AppError::not_found(DELETE_NOT_FOUND_MESSAGE));
        };

        self.journal_change(&tx, ctx, EventKind::CompanyDeleted, &deleted)?;
        tx.commit()
            .map_err(|err| fail(ctx, OP, ERR_TX_COMMIT, &err))?;

        info!(
            "event={OP} module=repo status=ok request_id={} company_id={} duration_ms={}",
            ctx.request_id(),
            deleted.id,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn log_internal(ctx: &RequestContext, op: &str, err: AppError) -> AppError {
    error!(
        "event={} module=repo status=error request_id={} error={}",
        op,
        ctx.request_id(),
        err.detailed()
    );
    err
}

fn fail(ctx: &RequestContext, op: &str, context: &str, err: &rusqlite::Error) -> AppError {
    log_internal(ctx, op, classify_timed_error(err, context, ctx))
}

fn fail_write(ctx: &RequestContext, op: &str, err: &rusqlite::Error) -> AppError {
    let classified = classify_write_error(err, NAME_CONFLICT_MESSAGE);
    if classified.kind() == ErrorKind::Conflict {
        debug!(
            "event={} module=repo status=conflict stage=constraint request_id={}",
            op,
            ctx.request_id()
        );
        return classified;
    }
    log_internal(ctx, op, classified)
}

fn parse_company_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err)))?;

    let type_text: String = row.get("type")?;
    let kind = type_text
        .parse::<CompanyType>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;

    let amount: i64 = row.get("amount_of_employees")?;
    let amount_of_employees = u32::try_from(amount)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(err)))?;

    Ok(Company {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        amount_of_employees,
        registered: row.get("registered")?,
        kind,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}
