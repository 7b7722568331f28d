//! Run a closure inside a transaction with guaranteed commit or rollback.

use tracing::{debug, warn};

use super::context::{DataSource, Transaction};
use super::error::{DataError, DataResult};

/// Run `action` inside a transaction begun on `source`.
///
/// - begin fails: that error is returned and `action` never runs
/// - `action` fails: the transaction is rolled back and the action's error is
///   returned unchanged; if the rollback fails too, both are returned as
///   [`DataError::Transaction`] with the action's error as the source
/// - `action` succeeds: the transaction is committed and a commit failure is
///   returned as is
///
/// Exactly one of commit or rollback runs, and the handle is consumed by it.
///
/// # Errors
/// See above.
#[track_caller]
pub fn with_transaction<S, T, F>(source: &S, action: F) -> DataResult<T>
where
    S: DataSource + ?Sized,
    F: FnOnce(&dyn Transaction) -> DataResult<T>,
{
    let tx = source.begin()?;

    match action(tx.as_ref()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(error) => match tx.rollback() {
            Ok(()) => {
                debug!(error = %error, "transaction rolled back after action failure");
                Err(error)
            }
            Err(rollback) => {
                warn!(error = %error, rollback_error = %rollback, "rollback failed after action failure");
                Err(DataError::Transaction { source: Box::new(error), rollback: Box::new(rollback) })
            }
        },
    }
}
