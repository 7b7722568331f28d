//! Data access errors

use statskit_common::stats::BoxError;

/// Errors returned by [`DataContext`](super::DataContext) implementations and
/// [`with_transaction`](super::with_transaction).
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// SQLite reported a failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No connection could be obtained from the pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A single-row query matched nothing.
    #[error("query returned no rows")]
    NoRows,

    /// A column value could not be converted to the requested type.
    #[error("failed to decode column '{column}': {message}")]
    Decode {
        /// Column name or index
        column: String,
        /// Conversion failure
        message: String,
    },

    /// Error raised by caller code running inside a transaction.
    #[error(transparent)]
    Action(BoxError),

    /// The action failed and so did the rollback that followed.
    ///
    /// `source` is the action's error; `rollback` is kept as context.
    #[error("{source} (rollback failed: {rollback})")]
    Transaction {
        /// Error returned by the action
        source: Box<DataError>,
        /// Error returned by the rollback
        rollback: Box<DataError>,
    },
}

impl DataError {
    /// Wrap an arbitrary caller error.
    pub fn action<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Action(error.into())
    }

    /// The error that caused the failure, looking through a failed rollback.
    pub fn primary(&self) -> &Self {
        match self {
            Self::Transaction { source, .. } => source.primary(),
            other => other,
        }
    }
}

/// Result type for data access operations
pub type DataResult<T> = Result<T, DataError>;
