//! Time SQLite operations into a Prometheus registry and print the scrape.
//!
//! ```text
//! RUST_LOG=debug cargo run -p statskit-infra --example instrumented_sqlite
//! ```

use std::sync::Arc;

use statskit_infra::config::{self, ConfigError};
use statskit_infra::database::{
    with_transaction, DataContext, DataError, InstrumentedDataSource, SqliteDataSource,
    SqlitePoolConfig,
};
use statskit_infra::observability::init_tracing;
use statskit_infra::observability::prometheus::sql_collectors;
use statskit_infra::StatsConfig;

fn main() -> anyhow::Result<()> {
    init_tracing(false)?;

    let config = match config::load() {
        Ok(config) => config,
        Err(ConfigError::NoConfigFile) => StatsConfig::default(),
        Err(e) => return Err(e.into()),
    };

    let prometheus = Arc::new(config.prometheus.client(sql_collectors("demo", "platform", "local")?)?);

    let dir = tempfile::tempdir()?;
    let inner = SqliteDataSource::open(dir.path().join("demo.db"), &SqlitePoolConfig::default())?;
    let db = InstrumentedDataSource::new(inner, prometheus.clone(), "demo");

    db.exec("CREATE TABLE jobs (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])?;
    with_transaction(&db, |tx| {
        tx.exec("INSERT INTO jobs (name) VALUES ('compact')", &[])?;
        tx.exec("INSERT INTO jobs (name) VALUES ('reindex')", &[])?;
        Ok(())
    })?;

    let failed = with_transaction(&db, |tx| {
        tx.exec("INSERT INTO jobs (name) VALUES ('orphan')", &[])?;
        Err::<(), _>(DataError::action("aborted by demo"))
    });
    tracing::info!(error = ?failed.err(), "second transaction rolled back");

    let jobs = db.select("SELECT name FROM jobs", &[])?;
    tracing::info!(count = jobs.len(), "jobs stored");

    prometheus.add_handler(|path, handler| {
        tracing::info!(path, "scrape endpoint would be mounted here");
        match handler.render() {
            Ok(body) => print!("{body}"),
            Err(e) => tracing::error!(error = %e, "render failed"),
        }
    });

    Ok(())
}
