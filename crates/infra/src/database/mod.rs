//! Data access with optional timing
//!
//! - [`DataContext`] / [`DataSource`] / [`Transaction`]: the query surface
//! - [`SqliteDataSource`]: r2d2-pooled SQLite implementation
//! - [`InstrumentedDataSource`]: decorator reporting `sql_operation` timings
//! - [`with_transaction`]: commit-or-rollback helper

pub mod context;
pub mod error;
pub mod instrumented;
pub mod rebind;
pub mod record;
pub mod sqlite;
pub mod transaction;

pub use context::{
    DataContext, DataContextExt, DataSource, ExecResult, PoolStats, SqlitePool, Transaction,
};
pub use error::{DataError, DataResult};
pub use instrumented::{InstrumentedDataSource, InstrumentedTransaction};
pub use rebind::{rebind, BindStyle};
pub use record::{FromRecord, Record, Rows};
pub use sqlite::{SqliteDataSource, SqlitePoolConfig, SqliteTransaction, SQLITE_DRIVER};
pub use transaction::with_transaction;
