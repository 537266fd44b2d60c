//! Scoped transactions and statement deadlines.
//!
//! # Invariants
//! - A [`TxScope`] that is dropped without `commit` is rolled back.
//! - A transaction the engine already ended (e.g. after an interrupt) is not
//!   rolled back again; only genuine rollback failures are logged.
//! - A [`DeadlineGuard`] removes its progress handler on drop so pooled
//!   connections never carry a stale deadline.

use crate::context::RequestContext;
use crate::error::ERR_TX_ROLLBACK;
use log::{debug, error};
use rusqlite::{Connection, DropBehavior, Transaction, TransactionBehavior};
use std::ops::Deref;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// VM steps between deadline checks.
const DEADLINE_CHECK_OPS: i32 = 1_000;

/// Write transaction with guaranteed release.
pub struct TxScope<'conn> {
    tx: Transaction<'conn>,
    request_id: Uuid,
    committed: bool,
}

impl<'conn> TxScope<'conn> {
    /// Begins an `IMMEDIATE` transaction, taking the database write lock up
    /// front so concurrent writers are serialized.
    ///
    /// Waiting for the lock is bounded by the request deadline when it is
    /// shorter than `lock_wait`, the connection's configured busy timeout,
    /// which is restored once the lock is taken or the wait gives up.
    pub fn begin(
        conn: &'conn Connection,
        ctx: &RequestContext,
        lock_wait: Duration,
    ) -> rusqlite::Result<Self> {
        let bounded = ctx
            .remaining()
            .filter(|remaining| *remaining < lock_wait);
        if let Some(remaining) = bounded {
            conn.busy_timeout(round_up_to_millis(remaining))?;
        }

        let begun = Transaction::new_unchecked(conn, TransactionBehavior::Immediate);
        if bounded.is_some() {
            conn.busy_timeout(lock_wait)?;
        }

        let mut tx = begun?;
        tx.set_drop_behavior(DropBehavior::Ignore);
        Ok(Self {
            tx,
            request_id: ctx.request_id(),
            committed: false,
        })
    }

    pub fn commit(mut self) -> rusqlite::Result<()> {
        self.tx.execute_batch("COMMIT;")?;
        self.committed = true;
        Ok(())
    }
}

impl Deref for TxScope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

impl Drop for TxScope<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        if self.tx.is_autocommit() {
            // Engine already rolled back; nothing left to release.
            debug!(
                "event=tx_release module=db status=already_finished request_id={}",
                self.request_id
            );
            return;
        }

        if let Err(err) = self.tx.execute_batch("ROLLBACK;") {
            error!(
                "event=tx_rollback module=db status=error request_id={} error={}: {}",
                self.request_id, ERR_TX_ROLLBACK, err
            );
        }
    }
}

/// SQLite takes whole milliseconds; rounding down would give up just before
/// the deadline.
fn round_up_to_millis(duration: Duration) -> Duration {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Interrupts statements on `conn` once the request deadline passes.
pub struct DeadlineGuard<'conn> {
    conn: &'conn Connection,
    armed: bool,
}

impl<'conn> DeadlineGuard<'conn> {
    pub fn arm(conn: &'conn Connection, ctx: &RequestContext) -> Self {
        match ctx.deadline() {
            Some(deadline) => {
                conn.progress_handler(
                    DEADLINE_CHECK_OPS,
                    Some(move || Instant::now() >= deadline),
                );
                Self { conn, armed: true }
            }
            None => Self { conn, armed: false },
        }
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}
