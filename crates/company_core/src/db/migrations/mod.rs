//! Schema migrations for the company store.
//!
//! Each step is an embedded SQL script; the highest applied step is stored in
//! `PRAGMA user_version`.
//!
//! # Invariants
//! - Steps are listed in strictly increasing version order.
//! - Pending steps run in one `IMMEDIATE` transaction, so concurrent openers
//!   of the same file migrate at most once.
//! - A database stamped with a version newer than [`latest_version`] is
//!   never touched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

struct Step {
    version: u32,
    name: &'static str,
    script: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "companies",
        script: include_str!("0001_companies.sql"),
    },
    Step {
        version: 2,
        name: "events",
        script: include_str!("0002_events.sql"),
    },
];

/// Schema version this binary migrates up to.
pub fn latest_version() -> u32 {
    STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Brings the schema on `conn` up to [`latest_version`].
///
/// Returns how many steps were applied; `0` when already current.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let latest = latest_version();
    ensure_supported(current_user_version(conn)?, latest)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Re-read under the write lock; another opener may have migrated.
    let from = read_user_version(&tx)?;
    ensure_supported(from, latest)?;

    let mut applied = 0;
    for step in STEPS.iter().filter(|step| step.version > from) {
        tx.execute_batch(step.script)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
        applied += 1;
    }
    tx.commit()?;

    Ok(applied)
}

/// Reads the schema version recorded on the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(read_user_version(conn)?)
}

fn read_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn ensure_supported(db_version: u32, latest_supported: u32) -> DbResult<()> {
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(())
}
