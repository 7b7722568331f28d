//! SQLite data source backed by an r2d2 connection pool.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{Connection, Params, ToSql};
use tracing::{debug, info, warn};

use super::context::{
    first_row, DataContext, DataSource, ExecResult, PoolStats, SqlitePool, Transaction,
};
use super::error::DataResult;
use super::record::{Record, Rows};

/// Driver identifier reported by SQLite data sources.
pub const SQLITE_DRIVER: &str = "sqlite";

/// Pool settings for [`SqliteDataSource`].
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Maximum number of pooled connections
    pub max_size: u32,
    /// How long to wait for a free connection
    pub connection_timeout: Duration,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout: Duration,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Pooled SQLite database implementing [`DataSource`].
#[derive(Clone)]
pub struct SqliteDataSource {
    pool: SqlitePool,
}

impl SqliteDataSource {
    /// Open (or create) a database file and build its pool.
    ///
    /// # Errors
    /// Returns [`DataError::Pool`](super::DataError::Pool) if the first
    /// connection cannot be established.
    pub fn open<P: AsRef<Path>>(path: P, config: &SqlitePoolConfig) -> DataResult<Self> {
        let path = path.as_ref();
        let busy_timeout = config.busy_timeout;

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(config.max_size.max(1))
            .connection_timeout(config.connection_timeout)
            .build(manager)?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlite pool initialised");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn connection(&self) -> DataResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDataSource").field("stats", &self.stats()).finish()
    }
}

impl DataContext for SqliteDataSource {
    fn driver_name(&self) -> &str {
        SQLITE_DRIVER
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        exec_on(&*self.connection()?, query, params)
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        exec_on(&*self.connection()?, query, params)
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        first_row(query_on(&*self.connection()?, query, params)?.into_records())
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        Ok(query_on(&*self.connection()?, query, params)?.into_records())
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        query_on(&*self.connection()?, query, params)
    }
}

impl DataSource for SqliteDataSource {
    fn begin(&self) -> DataResult<Box<dyn Transaction>> {
        let conn = self.connection()?;
        conn.execute_batch("BEGIN")?;
        debug!("sqlite transaction started");
        Ok(Box::new(SqliteTransaction { conn, finished: false }))
    }

    fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            max_size: self.pool.max_size(),
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Transaction holding a dedicated pooled connection.
///
/// Dropped without commit or rollback, it rolls back.
pub struct SqliteTransaction {
    conn: PooledConnection<SqliteConnectionManager>,
    finished: bool,
}

impl SqliteTransaction {
    fn finish(mut self: Box<Self>, statement: &str) -> DataResult<()> {
        self.conn.execute_batch(statement)?;
        self.finished = true;
        debug!(statement, "sqlite transaction finished");
        Ok(())
    }
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction").field("finished", &self.finished).finish()
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "rollback of abandoned transaction failed");
        } else {
            debug!("abandoned sqlite transaction rolled back");
        }
    }
}

impl DataContext for SqliteTransaction {
    fn driver_name(&self) -> &str {
        SQLITE_DRIVER
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        exec_on(&self.conn, query, params)
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        exec_on(&self.conn, query, params)
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        first_row(query_on(&self.conn, query, params)?.into_records())
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        Ok(query_on(&self.conn, query, params)?.into_records())
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        query_on(&self.conn, query, params)
    }
}

impl Transaction for SqliteTransaction {
    fn commit(self: Box<Self>) -> DataResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(self: Box<Self>) -> DataResult<()> {
        self.finish("ROLLBACK")
    }
}

// ============================================================================
// Statement helpers
// ============================================================================

fn exec_on<P: Params>(conn: &Connection, query: &str, params: P) -> DataResult<ExecResult> {
    let rows_affected = conn.execute(query, params)?;
    Ok(ExecResult { rows_affected, last_insert_id: conn.last_insert_rowid() })
}

fn query_on<P: Params>(conn: &Connection, query: &str, params: P) -> DataResult<Rows> {
    let mut stmt = conn.prepare(query)?;
    let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width).map(|i| row.get::<_, Value>(i)).collect::<Result<Vec<_>, _>>()?;
        records.push(Record::new(Arc::clone(&columns), values));
    }

    Ok(Rows::new(&columns, records))
}
