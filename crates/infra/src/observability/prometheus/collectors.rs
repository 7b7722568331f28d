//! Instrument set handed to [`PrometheusClient`](super::PrometheusClient)
//!
//! A [`Collectors`] value maps the name callers pass to
//! [`StatsClient`](statskit_common::StatsClient) methods onto a concrete
//! Prometheus instrument. Each instrumented component ships a preset so a
//! service only has to merge the presets it uses.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;
use std::fmt;

use ::prometheus::core::Collector;
use ::prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec,
};
use statskit_common::{StatsError, StatsResult};

/// Metric name used by the instrumented data source.
pub const SQL_OPERATION: &str = "sql_operation";
/// Metric name used by the instrumented HTTP client.
pub const HTTP_CLIENT_REQUEST: &str = "http_client_request";
/// Metric name used by the inbound request middleware.
pub const API_REQUEST_DURATION: &str = "api_request_duration";
/// Metric name used by the path/method-only inbound middleware.
pub const SIMPLE_API_REQUEST_DURATION: &str = "simple_api_request_duration";

/// A registered Prometheus instrument.
///
/// Vector variants take labels, scalar variants reject them.
#[derive(Clone)]
pub enum Instrument {
    /// Monotonic counter without labels
    Counter(Counter),
    /// Labeled monotonic counter
    CounterVec(CounterVec),
    /// Gauge without labels
    Gauge(Gauge),
    /// Labeled gauge
    GaugeVec(GaugeVec),
    /// Histogram without labels
    Histogram(Histogram),
    /// Labeled histogram
    HistogramVec(HistogramVec),
}

impl Instrument {
    /// Short name of the variant, used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Counter(_) => "counter",
            Self::CounterVec(_) => "counter vec",
            Self::Gauge(_) => "gauge",
            Self::GaugeVec(_) => "gauge vec",
            Self::Histogram(_) => "histogram",
            Self::HistogramVec(_) => "histogram vec",
        }
    }

    /// Whether the instrument is a vector that takes labels.
    pub const fn is_labeled(&self) -> bool {
        matches!(self, Self::CounterVec(_) | Self::GaugeVec(_) | Self::HistogramVec(_))
    }

    /// Fully qualified Prometheus name of the instrument.
    pub fn fq_name(&self) -> String {
        self.as_collector().desc().first().map(|desc| desc.fq_name.clone()).unwrap_or_default()
    }

    /// Declared label names (empty for scalar instruments).
    pub fn label_names(&self) -> Vec<String> {
        self.as_collector()
            .desc()
            .first()
            .map(|desc| desc.variable_labels.clone())
            .unwrap_or_default()
    }

    /// Boxed handle for registry (un)registration. Handles share state with `self`.
    pub(crate) fn boxed(&self) -> Box<dyn Collector> {
        match self {
            Self::Counter(c) => Box::new(c.clone()),
            Self::CounterVec(c) => Box::new(c.clone()),
            Self::Gauge(g) => Box::new(g.clone()),
            Self::GaugeVec(g) => Box::new(g.clone()),
            Self::Histogram(h) => Box::new(h.clone()),
            Self::HistogramVec(h) => Box::new(h.clone()),
        }
    }

    fn as_collector(&self) -> &dyn Collector {
        match self {
            Self::Counter(c) => c,
            Self::CounterVec(c) => c,
            Self::Gauge(g) => g,
            Self::GaugeVec(g) => g,
            Self::Histogram(h) => h,
            Self::HistogramVec(h) => h,
        }
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("kind", &self.kind())
            .field("name", &self.fq_name())
            .field("labels", &self.label_names())
            .finish()
    }
}

macro_rules! impl_from_instrument {
    ($($ty:ident),+) => {
        $(
            impl From<$ty> for Instrument {
                fn from(value: $ty) -> Self {
                    Self::$ty(value)
                }
            }
        )+
    };
}

impl_from_instrument!(Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec);

/// Name → instrument map.
#[derive(Debug, Clone, Default)]
pub struct Collectors(BTreeMap<String, Instrument>);

impl Collectors {
    /// Empty collector set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, instrument: impl Into<Instrument>) -> Self {
        self.insert(name, instrument);
        self
    }

    /// Insert or replace the instrument registered under `name`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        instrument: impl Into<Instrument>,
    ) -> Option<Instrument> {
        self.0.insert(name.into(), instrument.into())
    }

    /// Remove the instrument registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Instrument> {
        self.0.remove(name)
    }

    /// Look up an instrument.
    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.0.get(name)
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Combine two sets; entries from `other` win on name collisions.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, instrument)` pairs.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Instrument> {
        self.0.iter()
    }
}

impl IntoIterator for Collectors {
    type Item = (String, Instrument);
    type IntoIter = btree_map::IntoIter<String, Instrument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<S: Into<String>, I: Into<Instrument>> FromIterator<(S, I)> for Collectors {
    fn from_iter<T: IntoIterator<Item = (S, I)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(name, instrument)| (name.into(), instrument.into())).collect())
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Collectors for the instrumented data source (`sql_operation`).
///
/// # Errors
/// Returns [`StatsError::Backend`] if the instrument options are rejected.
pub fn sql_collectors(app: &str, team: &str, env: &str) -> StatsResult<Collectors> {
    let histogram = duration_histogram(
        SQL_OPERATION,
        "The duration of the sql operation",
        &["driver", "operation", "db", "caller"],
        app,
        team,
        env,
    )?;
    Ok(Collectors::new().with(SQL_OPERATION, histogram))
}

/// Collectors for the instrumented HTTP client (`http_client_request`).
///
/// # Errors
/// Returns [`StatsError::Backend`] if the instrument options are rejected.
pub fn http_client_collectors(app: &str, team: &str, env: &str) -> StatsResult<Collectors> {
    let histogram = duration_histogram(
        HTTP_CLIENT_REQUEST,
        "The duration of an http client request",
        &["hostname", "path", "method"],
        app,
        team,
        env,
    )?;
    Ok(Collectors::new().with(HTTP_CLIENT_REQUEST, histogram))
}

/// Collectors for the inbound request middleware.
///
/// # Errors
/// Returns [`StatsError::Backend`] if the instrument options are rejected.
pub fn api_collectors(app: &str, team: &str, env: &str) -> StatsResult<Collectors> {
    let full = duration_histogram(
        API_REQUEST_DURATION,
        "The duration of each request",
        &["path", "code", "method"],
        app,
        team,
        env,
    )?;
    let simple = duration_histogram(
        SIMPLE_API_REQUEST_DURATION,
        "The duration of each request",
        &["path", "method"],
        app,
        team,
        env,
    )?;
    Ok(Collectors::new().with(API_REQUEST_DURATION, full).with(SIMPLE_API_REQUEST_DURATION, simple))
}

fn duration_histogram(
    name: &str,
    help: &str,
    label_names: &[&str],
    app: &str,
    team: &str,
    env: &str,
) -> StatsResult<HistogramVec> {
    let const_labels: HashMap<String, String> = [("app", app), ("team", team), ("env", env)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let opts = HistogramOpts::new(name, help).const_labels(const_labels);
    HistogramVec::new(opts, label_names).map_err(|e| StatsError::backend("prometheus", e))
}
