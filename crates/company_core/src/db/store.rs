//! Pooled SQLite storage handle.
//!
//! # Responsibility
//! - Build the `r2d2` pool from [`DbConfig`] and configure every connection.
//! - Run schema migrations once before the handle is handed out.
//! - Acquire connections within the caller's deadline.
//! - Report pool health.
//!
//! # Invariants
//! - Returned connections have WAL, `foreign_keys=ON` and a busy timeout set.
//! - The handle is constructed by the composition root and passed by
//!   reference or clone; there is no process-wide instance.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::config::DbConfig;
use crate::context::RequestContext;
use log::{error, info, warn};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::time::{Duration, Instant};

pub type ConnectionPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// SQL expression for the store clock in epoch milliseconds.
pub const NOW_MS_SQL: &str = "CAST(unixepoch('subsec') * 1000 AS INTEGER)";

const NEAR_CAPACITY_PERCENT: u32 = 90;
const MEMORY_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout: Duration,
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }
}

/// Shared, cloneable handle over the connection pool.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
    lock_wait: Duration,
}

impl Store {
    /// Opens a pool over the configured database and applies migrations.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(config: &DbConfig) -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode=file");

        let flags = OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI;
        let manager = SqliteConnectionManager::file(&config.conn_string).with_flags(flags);
        let min_idle = config.max_idle_conns.min(config.max_open_conns);
        let pool = Pool::builder()
            .max_size(config.max_open_conns)
            .min_idle(Some(min_idle))
            .max_lifetime(non_zero(config.conn_max_lifetime))
            .idle_timeout(non_zero(config.conn_max_idle_time))
            .connection_timeout(config.busy_timeout.max(Duration::from_secs(1)))
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout: config.busy_timeout,
                wal: true,
            }))
            .build(manager);

        let store = match pool {
            Ok(pool) => Self {
                pool,
                lock_wait: config.busy_timeout,
            },
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        store.bootstrap("file", started_at)?;
        Ok(store)
    }

    /// Opens a single-connection in-memory store.
    ///
    /// The pool never recycles its only connection, so the database lives as
    /// long as the handle.
    pub fn open_in_memory() -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode=memory");

        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_timeout(Duration::from_secs(5))
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout: MEMORY_BUSY_TIMEOUT,
                wal: false,
            }))
            .build(SqliteConnectionManager::memory());

        let store = match pool {
            Ok(pool) => Self {
                pool,
                lock_wait: MEMORY_BUSY_TIMEOUT,
            },
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        store.bootstrap("memory", started_at)?;
        Ok(store)
    }

    fn bootstrap(&self, mode: &str, started_at: Instant) -> DbResult<()> {
        let result = self
            .pool
            .get()
            .map_err(DbError::from)
            .and_then(|mut conn| apply_migrations(&mut conn));

        match result {
            Ok(applied) => {
                info!(
                    "event=db_open module=db status=ok mode={} duration_ms={} max_size={} migrations_applied={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    self.pool.max_size(),
                    applied
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Checks out a connection, waiting no longer than the caller's deadline.
    pub fn connection(&self, ctx: &RequestContext) -> Result<PooledConnection, r2d2::Error> {
        match ctx.remaining() {
            Some(remaining) => self.pool.get_timeout(remaining),
            None => self.pool.get(),
        }
    }

    /// Busy timeout every pooled connection is configured with.
    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Pings the database and reports pool usage.
    pub fn health(&self) -> DbHealth {
        let started_at = Instant::now();
        let max_size = self.pool.max_size();
        let mut health = DbHealth {
            status: HealthStatus::Unreachable,
            open_connections: 0,
            idle_connections: 0,
            in_use_connections: 0,
            max_open_connections: max_size,
            response_time_ms: 0,
        };

        let ping = self.pool.get().map_err(|err| err.to_string()).and_then(|conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
                .map_err(|err| err.to_string())
        });
        health.response_time_ms = started_at.elapsed().as_millis() as u64;

        let state = self.pool.state();
        health.open_connections = state.connections;
        health.idle_connections = state.idle_connections;
        health.in_use_connections = state.connections.saturating_sub(state.idle_connections);

        match ping {
            Ok(_) => {
                if health.in_use_connections * 100 >= max_size * NEAR_CAPACITY_PERCENT {
                    warn!(
                        "event=db_health module=db status=near_capacity in_use={} max={}",
                        health.in_use_connections, max_size
                    );
                    health.status = HealthStatus::NearCapacity;
                } else {
                    health.status = HealthStatus::Healthy;
                }
            }
            Err(err) => {
                error!(
                    "event=db_health module=db status=error error_code=db_ping_failed error={}",
                    err
                );
            }
        }

        health
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    #[serde(rename = "Near Capacity")]
    NearCapacity,
    Unreachable,
}

/// Database health snapshot. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbHealth {
    pub status: HealthStatus,
    pub open_connections: u32,
    pub idle_connections: u32,
    pub in_use_connections: u32,
    pub max_open_connections: u32,
    pub response_time_ms: u64,
}
