//! Timing decorators for [`DataSource`] and [`Transaction`]
//!
//! Every query, exec, commit and rollback is timed and reported as
//! `sql_operation` with the labels `driver`, `operation`, `db` and `caller`.
//! Results are returned untouched; a failed emission is logged and dropped.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use rusqlite::ToSql;
use statskit_common::stats::warn_on_failure;
use statskit_common::{labels, StatsClient};

use super::context::{
    DataContext, DataSource, ExecResult, PoolStats, SqlitePool, Transaction,
};
use super::error::DataResult;
use super::rebind::BindStyle;
use super::record::{Record, Rows};
use crate::observability::prometheus::SQL_OPERATION;

const OP_SELECT: &str = "select";
const OP_EXEC: &str = "exec";
const OP_COMMIT: &str = "commit";
const OP_ROLLBACK: &str = "rollback";

/// Shared timing state, cloned into every transaction a source begins.
#[derive(Clone)]
struct Recorder {
    stats: Arc<dyn StatsClient>,
    db: Arc<str>,
    caller_tag: Option<Arc<str>>,
}

impl Recorder {
    /// Run `f`, then emit its duration. Labels the sample with the location
    /// that called into the decorator unless a fixed tag was configured.
    #[track_caller]
    fn time<T>(&self, driver: &str, operation: &'static str, f: impl FnOnce() -> T) -> T {
        let location = Location::caller();

        let start = Instant::now();
        let output = f();
        let elapsed = start.elapsed();

        let caller = match &self.caller_tag {
            Some(tag) => tag.to_string(),
            None => format!("{}:{}", location.file(), location.line()),
        };
        let labels = labels!["driver", driver, "operation", operation, "db", &*self.db, "caller", caller];
        warn_on_failure(SQL_OPERATION, self.stats.timing(SQL_OPERATION, &labels, elapsed));

        output
    }
}

/// [`DataSource`] decorator that times every operation.
///
/// ```rust
/// use std::sync::Arc;
///
/// use statskit_common::NoOpStatsClient;
/// use statskit_infra::database::{
///     DataContext, InstrumentedDataSource, SqliteDataSource, SqlitePoolConfig,
/// };
///
/// let dir = tempfile::tempdir().unwrap();
/// let inner = SqliteDataSource::open(dir.path().join("app.db"), &SqlitePoolConfig::default())
///     .unwrap();
/// let db = InstrumentedDataSource::new(inner, Arc::new(NoOpStatsClient), "app");
///
/// db.exec("CREATE TABLE t (id INTEGER)", &[]).unwrap();
/// ```
pub struct InstrumentedDataSource<D> {
    inner: D,
    recorder: Recorder,
}

impl<D: DataSource> InstrumentedDataSource<D> {
    /// Wrap `inner`, reporting to `stats` under database name `db`.
    pub fn new(inner: D, stats: Arc<dyn StatsClient>, db: impl Into<String>) -> Self {
        let db: String = db.into();
        Self { inner, recorder: Recorder { stats, db: db.into(), caller_tag: None } }
    }

    /// Use a fixed `caller` label instead of the call-site location.
    #[must_use]
    pub fn with_caller_tag(mut self, tag: impl Into<String>) -> Self {
        let tag: String = tag.into();
        self.recorder.caller_tag = Some(tag.into());
        self
    }

    /// Database name used for the `db` label.
    pub fn db_name(&self) -> &str {
        &self.recorder.db
    }

    /// Wrapped data source.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Unwrap the decorator.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: fmt::Debug> fmt::Debug for InstrumentedDataSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedDataSource")
            .field("inner", &self.inner)
            .field("db", &self.recorder.db)
            .field("stats", &self.recorder.stats)
            .finish()
    }
}

impl<D: DataSource> DataContext for InstrumentedDataSource<D> {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    fn bind_style(&self) -> BindStyle {
        self.inner.bind_style()
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        self.recorder.time(self.inner.driver_name(), OP_EXEC, || self.inner.exec(query, params))
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        self.recorder
            .time(self.inner.driver_name(), OP_EXEC, || self.inner.named_exec(query, params))
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        self.recorder.time(self.inner.driver_name(), OP_SELECT, || self.inner.get(query, params))
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        self.recorder
            .time(self.inner.driver_name(), OP_SELECT, || self.inner.select(query, params))
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        self.recorder.time(self.inner.driver_name(), OP_SELECT, || self.inner.query(query, params))
    }

    fn rebind(&self, query: &str) -> String {
        self.inner.rebind(query)
    }
}

impl<D: DataSource> DataSource for InstrumentedDataSource<D> {
    fn begin(&self) -> DataResult<Box<dyn Transaction>> {
        let inner = self.inner.begin()?;
        Ok(Box::new(InstrumentedTransaction { inner, recorder: self.recorder.clone() }))
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    fn pool(&self) -> &SqlitePool {
        self.inner.pool()
    }
}

/// [`Transaction`] decorator returned by [`InstrumentedDataSource::begin`].
pub struct InstrumentedTransaction {
    inner: Box<dyn Transaction>,
    recorder: Recorder,
}

impl fmt::Debug for InstrumentedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedTransaction")
            .field("driver", &self.inner.driver_name())
            .field("db", &self.recorder.db)
            .finish_non_exhaustive()
    }
}

impl DataContext for InstrumentedTransaction {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    fn bind_style(&self) -> BindStyle {
        self.inner.bind_style()
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        self.recorder.time(self.inner.driver_name(), OP_EXEC, || self.inner.exec(query, params))
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        self.recorder
            .time(self.inner.driver_name(), OP_EXEC, || self.inner.named_exec(query, params))
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        self.recorder.time(self.inner.driver_name(), OP_SELECT, || self.inner.get(query, params))
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        self.recorder
            .time(self.inner.driver_name(), OP_SELECT, || self.inner.select(query, params))
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        self.recorder.time(self.inner.driver_name(), OP_SELECT, || self.inner.query(query, params))
    }

    fn rebind(&self, query: &str) -> String {
        self.inner.rebind(query)
    }
}

impl Transaction for InstrumentedTransaction {
    fn commit(self: Box<Self>) -> DataResult<()> {
        let Self { inner, recorder } = *self;
        let driver = inner.driver_name().to_string();
        recorder.time(&driver, OP_COMMIT, move || inner.commit())
    }

    fn rollback(self: Box<Self>) -> DataResult<()> {
        let Self { inner, recorder } = *self;
        let driver = inner.driver_name().to_string();
        recorder.time(&driver, OP_ROLLBACK, move || inner.rollback())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::named_params;
    use statskit_common::testing::RecordingStatsClient;
    use tempfile::TempDir;

    use super::*;
    use crate::database::{DataError, SqliteDataSource, SqlitePoolConfig};

    fn instrumented() -> (TempDir, RecordingStatsClient, InstrumentedDataSource<SqliteDataSource>) {
        let dir = TempDir::new().unwrap();
        let inner =
            SqliteDataSource::open(dir.path().join("instrumented.db"), &SqlitePoolConfig::default())
                .unwrap();
        inner.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();

        let stats = RecordingStatsClient::new();
        let source = InstrumentedDataSource::new(inner, Arc::new(stats.clone()), "inventory");
        (dir, stats, source)
    }

    #[test]
    fn test_operations_are_labeled() {
        let (_dir, stats, source) = instrumented();

        source.exec("INSERT INTO items (name) VALUES ('a')", &[]).unwrap();
        source.select("SELECT * FROM items", &[]).unwrap();

        let timings = stats.timings(SQL_OPERATION);
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].label("operation"), Some("exec"));
        assert_eq!(timings[1].label("operation"), Some("select"));
        for timing in &timings {
            assert_eq!(timing.label("driver"), Some("sqlite"));
            assert_eq!(timing.label("db"), Some("inventory"));
        }
    }

    #[test]
    fn test_caller_label_points_at_call_site() {
        let (_dir, stats, source) = instrumented();

        let line = line!() + 1;
        source.get("SELECT 1 AS one", &[]).unwrap();

        let timing = &stats.timings(SQL_OPERATION)[0];
        assert_eq!(timing.label("caller"), Some(format!("{}:{line}", file!()).as_str()));
    }

    #[test]
    fn test_caller_tag_overrides_location() {
        let (_dir, stats, source) = instrumented();
        let source = source.with_caller_tag("nightly-report");

        source.query("SELECT 1", &[]).unwrap();
        assert_eq!(stats.timings(SQL_OPERATION)[0].label("caller"), Some("nightly-report"));
    }

    #[test]
    fn test_errors_pass_through_and_are_timed() {
        let (_dir, stats, source) = instrumented();

        let err = source.get("SELECT * FROM items WHERE id = 99", &[]).unwrap_err();
        assert!(matches!(err, DataError::NoRows));

        let err = source.exec("INSERT INTO missing VALUES (1)", &[]).unwrap_err();
        assert!(matches!(err, DataError::Sqlite(_)));

        assert_eq!(stats.timings(SQL_OPERATION).len(), 2);
    }

    #[test]
    fn test_failed_emission_does_not_change_result() {
        let dir = TempDir::new().unwrap();
        let inner =
            SqliteDataSource::open(dir.path().join("failing.db"), &SqlitePoolConfig::default())
                .unwrap();
        let stats = RecordingStatsClient::failing();
        let source = InstrumentedDataSource::new(inner, Arc::new(stats.clone()), "inventory");

        let record = source.get("SELECT 42 AS answer", &[]).unwrap();
        assert_eq!(record.get::<i64>("answer").unwrap(), 42);
        assert_eq!(stats.calls().len(), 1);
    }

    #[test]
    fn test_transaction_operations_are_timed() {
        let (_dir, stats, source) = instrumented();

        let tx = source.begin().unwrap();
        tx.exec("INSERT INTO items (name) VALUES ('b')", &[]).unwrap();
        tx.commit().unwrap();

        let tx = source.begin().unwrap();
        tx.rollback().unwrap();

        let operations: Vec<String> = stats
            .timings(SQL_OPERATION)
            .iter()
            .filter_map(|t| t.label("operation").map(str::to_string))
            .collect();
        assert_eq!(operations, vec!["exec", "commit", "rollback"]);
    }

    #[test]
    fn test_untimed_operations() {
        let (_dir, stats, source) = instrumented();

        assert_eq!(source.rebind("SELECT ?"), "SELECT ?");
        assert_eq!(source.driver_name(), "sqlite");
        let _ = source.stats();
        let _ = source.pool().state();

        assert!(stats.calls().is_empty());
    }

    /// Shared log of every call that reaches the wrapped source.
    type CallLog = Arc<parking_lot::Mutex<Vec<String>>>;

    fn describe(params: &[&dyn ToSql]) -> String {
        let values: Vec<String> = params.iter().map(|p| format!("{:?}", p.to_sql())).collect();
        values.join(",")
    }

    fn describe_named(params: &[(&str, &dyn ToSql)]) -> String {
        let values: Vec<String> =
            params.iter().map(|(name, p)| format!("{name}={:?}", p.to_sql())).collect();
        values.join(",")
    }

    /// Passes every call to a SQLite source and logs call, arguments and result.
    struct LoggingSource {
        inner: SqliteDataSource,
        log: CallLog,
    }

    struct LoggingTransaction {
        inner: Box<dyn Transaction>,
        log: CallLog,
    }

    fn logged<T: fmt::Debug>(log: &CallLog, call: String, result: DataResult<T>) -> DataResult<T> {
        log.lock().push(format!("{call} -> {result:?}"));
        result
    }

    macro_rules! logging_context {
        ($ty:ty) => {
            impl DataContext for $ty {
                fn driver_name(&self) -> &str {
                    self.inner.driver_name()
                }

                fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
                    let call = format!("exec {query} [{}]", describe(params));
                    logged(&self.log, call, self.inner.exec(query, params))
                }

                fn named_exec(
                    &self,
                    query: &str,
                    params: &[(&str, &dyn ToSql)],
                ) -> DataResult<ExecResult> {
                    let call = format!("named_exec {query} [{}]", describe_named(params));
                    logged(&self.log, call, self.inner.named_exec(query, params))
                }

                fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
                    let call = format!("get {query} [{}]", describe(params));
                    logged(&self.log, call, self.inner.get(query, params))
                }

                fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
                    let call = format!("select {query} [{}]", describe(params));
                    logged(&self.log, call, self.inner.select(query, params))
                }

                fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
                    let call = format!("query {query} [{}]", describe(params));
                    logged(&self.log, call, self.inner.query(query, params))
                }
            }
        };
    }

    logging_context!(LoggingSource);
    logging_context!(LoggingTransaction);

    impl DataSource for LoggingSource {
        fn begin(&self) -> DataResult<Box<dyn Transaction>> {
            let inner = self.inner.begin();
            self.log.lock().push(format!("begin -> ok={}", inner.is_ok()));
            Ok(Box::new(LoggingTransaction { inner: inner?, log: Arc::clone(&self.log) }))
        }

        fn stats(&self) -> PoolStats {
            self.inner.stats()
        }

        fn pool(&self) -> &SqlitePool {
            self.inner.pool()
        }
    }

    impl Transaction for LoggingTransaction {
        fn commit(self: Box<Self>) -> DataResult<()> {
            let Self { inner, log } = *self;
            logged(&log, "commit".to_string(), inner.commit())
        }

        fn rollback(self: Box<Self>) -> DataResult<()> {
            let Self { inner, log } = *self;
            logged(&log, "rollback".to_string(), inner.rollback())
        }
    }

    fn logging_source(dir: &TempDir) -> (LoggingSource, CallLog) {
        let inner = SqliteDataSource::open(dir.path().join("calls.db"), &SqlitePoolConfig::default())
            .unwrap();
        inner.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT UNIQUE)", &[]).unwrap();
        let log = CallLog::default();
        (LoggingSource { inner, log: Arc::clone(&log) }, log)
    }

    /// Mixed workload with failures, a rollback and a commit.
    fn workload(source: &impl DataSource) -> Vec<String> {
        let mut outcomes = Vec::new();
        let name = "b";

        outcomes.push(format!("{:?}", source.exec("INSERT INTO items (name) VALUES (?1)", &[&"a"])));
        outcomes.push(format!(
            "{:?}",
            source.named_exec("INSERT INTO items (name) VALUES (:name)", named_params! { ":name": name })
        ));
        outcomes.push(format!("{:?}", source.exec("INSERT INTO items (name) VALUES (?1)", &[&"a"])));
        outcomes.push(format!("{:?}", source.get("SELECT name FROM items WHERE id = ?1", &[&99])));
        outcomes.push(format!("{:?}", source.select("SELECT id, name FROM items ORDER BY id", &[])));

        let tx = source.begin().unwrap();
        outcomes.push(format!("{:?}", tx.exec("INSERT INTO items (name) VALUES ('c')", &[])));
        outcomes.push(format!("{:?}", tx.query("SELECT COUNT(*) AS n FROM items", &[])));
        outcomes.push(format!("{:?}", tx.rollback()));

        let tx = source.begin().unwrap();
        outcomes.push(format!("{:?}", tx.exec("INSERT INTO items (name) VALUES ('d')", &[])));
        outcomes.push(format!("{:?}", tx.commit()));

        outcomes.push(format!("{:?}", source.select("SELECT name FROM items ORDER BY id", &[])));
        outcomes
    }

    #[test]
    fn test_decorated_calls_match_undecorated() {
        let plain_dir = TempDir::new().unwrap();
        let (plain, plain_log) = logging_source(&plain_dir);
        let plain_outcomes = workload(&plain);

        let decorated_dir = TempDir::new().unwrap();
        let (inner, decorated_log) = logging_source(&decorated_dir);
        let stats = RecordingStatsClient::new();
        let decorated = InstrumentedDataSource::new(inner, Arc::new(stats.clone()), "inventory");
        let decorated_outcomes = workload(&decorated);

        assert_eq!(*decorated_log.lock(), *plain_log.lock());
        assert_eq!(decorated_outcomes, plain_outcomes);

        let log = plain_log.lock();
        assert!(log.iter().any(|call| call.starts_with("get ") && call.contains("NoRows")));
        assert!(log.iter().any(|call| call == "rollback -> Ok(())"));
        assert!(plain_outcomes[2].starts_with("Err("));

        // begin is not timed; every other call is.
        let calls = log.len() - 2;
        assert_eq!(stats.timings(SQL_OPERATION).len(), calls);
    }
}
