//! Shared fixtures for the infra integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rusqlite::ToSql;
use statskit_infra::database::{
    DataContext, DataError, DataResult, DataSource, ExecResult, PoolStats, Record, Rows,
    SqliteDataSource, SqlitePool, SqlitePoolConfig, Transaction,
};
use tempfile::TempDir;

/// Temporary SQLite database with an `items` table. The file lives as long as
/// the wrapper.
pub struct TestDatabase {
    pub source: SqliteDataSource,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let source = SqliteDataSource::open(temp_dir.path().join("test.db"), &SqlitePoolConfig::default())
            .expect("sqlite pool should open");
        source
            .exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)", &[])
            .expect("schema should apply");

        Self { source, _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Names stored in `items`, in insertion order.
pub fn item_names(ctx: &dyn DataContext) -> Vec<String> {
    ctx.select("SELECT name FROM items ORDER BY id", &[])
        .expect("select should succeed")
        .iter()
        .map(|record| record.get("name").expect("name column"))
        .collect()
}

/// Which terminal operations a [`FlakyDataSource`] should refuse.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub begin: bool,
    pub commit: bool,
    pub rollback: bool,
}

/// Data source over a real SQLite file whose transaction lifecycle can be
/// made to fail on demand. Every begin/commit/rollback attempt is logged.
pub struct FlakyDataSource {
    inner: SqliteDataSource,
    faults: Faults,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl FlakyDataSource {
    pub fn new(inner: SqliteDataSource, faults: Faults) -> Self {
        Self { inner, faults, log: Arc::default() }
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl DataContext for FlakyDataSource {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        self.inner.exec(query, params)
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        self.inner.named_exec(query, params)
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        self.inner.get(query, params)
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        self.inner.select(query, params)
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        self.inner.query(query, params)
    }
}

impl DataSource for FlakyDataSource {
    fn begin(&self) -> DataResult<Box<dyn Transaction>> {
        self.log.lock().unwrap().push("begin");
        if self.faults.begin {
            return Err(DataError::action("begin refused"));
        }
        let inner = self.inner.begin()?;
        Ok(Box::new(FlakyTransaction { inner, faults: self.faults, log: Arc::clone(&self.log) }))
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    fn pool(&self) -> &SqlitePool {
        self.inner.pool()
    }
}

struct FlakyTransaction {
    inner: Box<dyn Transaction>,
    faults: Faults,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl DataContext for FlakyTransaction {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    fn exec(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<ExecResult> {
        self.inner.exec(query, params)
    }

    fn named_exec(&self, query: &str, params: &[(&str, &dyn ToSql)]) -> DataResult<ExecResult> {
        self.inner.named_exec(query, params)
    }

    fn get(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Record> {
        self.inner.get(query, params)
    }

    fn select(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Vec<Record>> {
        self.inner.select(query, params)
    }

    fn query(&self, query: &str, params: &[&dyn ToSql]) -> DataResult<Rows> {
        self.inner.query(query, params)
    }
}

impl Transaction for FlakyTransaction {
    // A refused commit drops the inner transaction, which rolls it back.
    fn commit(self: Box<Self>) -> DataResult<()> {
        self.log.lock().unwrap().push("commit");
        if self.faults.commit {
            return Err(DataError::action("commit refused"));
        }
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) -> DataResult<()> {
        self.log.lock().unwrap().push("rollback");
        if self.faults.rollback {
            return Err(DataError::action("rollback refused"));
        }
        self.inner.rollback()
    }
}
