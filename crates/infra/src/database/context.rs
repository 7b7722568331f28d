//! Data access traits
//!
//! [`DataContext`] is the query surface shared by a data source and a
//! transaction. [`DataSource`] adds transaction begin and pool access;
//! [`Transaction`] adds the two terminal operations.
//!
//! Instrumented and plain implementations are interchangeable through these
//! traits, so callers hold `&dyn DataSource` / `Box<dyn Transaction>` and never
//! need to know whether timing is switched on.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;

use super::error::{DataError, DataResult};
use super::rebind::{rebind, BindStyle};
use super::record::{FromRecord, Record, Rows};

/// Connection pool type used by SQLite data sources.
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows changed, inserted or deleted
    pub rows_affected: usize,
    /// Rowid of the most recent successful insert on the connection
    pub last_insert_id: i64,
}

/// Snapshot of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of connections the pool will open
    pub max_size: u32,
    /// Connections currently open
    pub connections: u32,
    /// Open connections not checked out
    pub idle_connections: u32,
}

/// Query operations shared by data sources and transactions.
///
/// The timed operations carry `#[track_caller]` so decorators can label a
/// sample with the location of the code that issued the query.
pub trait DataContext {
    /// Driver identifier, e.g. `sqlite`.
    fn driver_name(&self) -> &str;

    /// Placeholder style expected by the driver.
    fn bind_style(&self) -> BindStyle {
        BindStyle::Question
    }

    /// Execute a statement with positional parameters.
    #[track_caller]
    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult>;

    /// Execute a statement with named parameters (`:name`, `@name`, `$name`).
    #[track_caller]
    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult>;

    /// Execute a statement and panic on failure.
    ///
    /// # Panics
    /// Panics with the underlying error when the statement fails.
    #[track_caller]
    #[allow(clippy::panic)]
    fn must_exec(&self, query: &str, params: &[&dyn ToSql]) -> ExecResult {
        match self.exec(query, params) {
            Ok(result) => result,
            Err(e) => panic!("must_exec failed for `{query}`: {e}"),
        }
    }

    /// Fetch the first row of a query.
    ///
    /// # Errors
    /// [`DataError::NoRows`] when the query matches nothing.
    #[track_caller]
    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record>;

    /// Fetch every row of a query.
    #[track_caller]
    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>>;

    /// Run a query and return rows with their column names.
    #[track_caller]
    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows>;

    /// Rewrite `?` placeholders into the driver's style.
    fn rebind(&self, query: &str) -> String {
        rebind(self.bind_style(), query)
    }
}

/// Typed helpers on top of [`DataContext`].
pub trait DataContextExt: DataContext {
    /// [`DataContext::get`] mapped through [`FromRecord`].
    #[track_caller]
    fn get_as<T: FromRecord>(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<T> {
        T::from_record(&self.get(query, params)?)
    }

    /// [`DataContext::select`] mapped through [`FromRecord`].
    #[track_caller]
    fn select_as<T: FromRecord>(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<T>> {
        self.select(query, params)?.iter().map(T::from_record).collect()
    }
}

impl<C: DataContext + ?Sized> DataContextExt for C {}

/// A pooled database that can start transactions.
pub trait DataSource: DataContext + Send + Sync {
    /// Start a transaction on a dedicated connection.
    fn begin(&self) -> DataResult<Box<dyn Transaction>>;

    /// Start a transaction and panic on failure.
    ///
    /// # Panics
    /// Panics with the underlying error when no transaction can be started.
    #[track_caller]
    #[allow(clippy::panic)]
    fn must_begin(&self) -> Box<dyn Transaction> {
        match self.begin() {
            Ok(tx) => tx,
            Err(e) => panic!("must_begin failed: {e}"),
        }
    }

    /// Connection pool snapshot.
    fn stats(&self) -> PoolStats;

    /// Underlying connection pool.
    fn pool(&self) -> &SqlitePool;
}

/// An open transaction.
///
/// Both terminal operations consume the handle, so it cannot be used after
/// commit or rollback.
pub trait Transaction: DataContext + Send {
    /// Commit the transaction.
    #[track_caller]
    fn commit(self: Box<Self>) -> DataResult<()>;

    /// Roll the transaction back.
    #[track_caller]
    fn rollback(self: Box<Self>) -> DataResult<()>;
}

/// Error for [`DataContext::get`] when the query produced nothing.
pub(crate) fn first_row(records: Vec<Record>) -> DataResult<Record> {
    records.into_iter().next().ok_or(DataError::NoRows)
}
