//! Pull-model [`StatsClient`] backed by a private Prometheus registry.

use std::fmt;
use std::time::Duration;

use ::prometheus::core::{MetricVec, MetricVecBuilder};
use ::prometheus::{Encoder, Registry, TextEncoder};
use parking_lot::RwLock;
use statskit_common::{Labels, StatsClient, StatsError, StatsResult};
use tracing::{debug, info, warn};

use super::collectors::{Collectors, Instrument};

/// Default path the scrape handler is mounted on.
pub const DEFAULT_HANDLER_PATH: &str = "/prometheus_metrics";

const BACKEND: &str = "prometheus";

/// Stats client that records into pre-registered Prometheus instruments.
///
/// Each client owns its own [`Registry`]; nothing is registered in the
/// process-wide default registry. The name → instrument map and the registry
/// are only mutated together under one write lock.
pub struct PrometheusClient {
    registry: Registry,
    handler_path: String,
    collectors: RwLock<Collectors>,
}

impl PrometheusClient {
    /// Build a client and register every collector.
    ///
    /// # Errors
    /// Returns [`StatsError::Backend`] when the registry rejects a collector,
    /// e.g. two entries share a fully qualified metric name.
    pub fn new(handler_path: impl Into<String>, collectors: Collectors) -> StatsResult<Self> {
        let registry = Registry::new();
        for (name, instrument) in collectors.iter() {
            registry.register(instrument.boxed()).map_err(|e| {
                debug!(metric = %name, error = %e, "collector registration rejected");
                StatsError::backend(BACKEND, e)
            })?;
        }

        let handler_path = handler_path.into();
        info!(path = %handler_path, collectors = collectors.len(), "prometheus stats client ready");

        Ok(Self { registry, handler_path, collectors: RwLock::new(collectors) })
    }

    /// Path the scrape handler should be mounted on.
    pub fn handler_path(&self) -> &str {
        &self.handler_path
    }

    /// Underlying registry, for exporters that need direct access.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register more collectors at runtime.
    ///
    /// A name that is already present is replaced: the old instrument is
    /// unregistered before the new one is registered, and put back if the
    /// registry rejects the new one.
    ///
    /// # Errors
    /// Returns [`StatsError::Backend`] if the registry rejects a collector.
    /// Entries processed before the failing one stay registered.
    pub fn add_collectors(&self, collectors: Collectors) -> StatsResult<()> {
        let mut current = self.collectors.write();

        for (name, instrument) in collectors {
            let previous = current.remove(&name);
            if let Some(previous) = &previous {
                if let Err(e) = self.registry.unregister(previous.boxed()) {
                    debug!(metric = %name, error = %e, "replaced collector was not registered");
                }
            }

            if let Err(e) = self.registry.register(instrument.boxed()) {
                if let Some(previous) = previous {
                    self.restore(&mut current, name, previous);
                }
                return Err(StatsError::backend(BACKEND, e));
            }
            debug!(metric = %name, kind = instrument.kind(), "collector added");
            current.insert(name, instrument);
        }

        Ok(())
    }

    /// Re-register an instrument whose replacement was rejected.
    fn restore(&self, current: &mut Collectors, name: String, previous: Instrument) {
        match self.registry.register(previous.boxed()) {
            Ok(()) => {
                debug!(metric = %name, "replacement rejected, previous collector kept");
                current.insert(name, previous);
            }
            Err(e) => warn!(metric = %name, error = %e, "previous collector could not be restored"),
        }
    }

    /// Unregister collectors by name. Unknown names are ignored.
    pub fn remove_collectors<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.collectors.write();

        for name in names {
            let name = name.as_ref();
            if let Some(previous) = current.remove(name) {
                if let Err(e) = self.registry.unregister(previous.boxed()) {
                    debug!(metric = %name, error = %e, "removed collector was not registered");
                }
                debug!(metric = %name, "collector removed");
            }
        }
    }

    /// Whether a collector is registered under `name`.
    pub fn has_collector(&self, name: &str) -> bool {
        self.collectors.read().contains(name)
    }

    /// Hand the scrape handler to a router.
    ///
    /// The callback receives the configured path and a handler that renders
    /// this client's registry. Mounting is entirely up to the caller.
    pub fn add_handler<F>(&self, callback: F)
    where
        F: FnOnce(&str, ScrapeHandler),
    {
        callback(&self.handler_path, self.scrape_handler());
    }

    /// Scrape handler for this client's registry.
    pub fn scrape_handler(&self) -> ScrapeHandler {
        ScrapeHandler { registry: self.registry.clone() }
    }

    /// Look up `name` and apply `f` while holding the read lock.
    fn with_instrument<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Instrument) -> StatsResult<T>,
    ) -> StatsResult<T> {
        let collectors = self.collectors.read();
        let instrument = collectors.get(name).ok_or_else(|| StatsError::unknown_metric(name))?;
        f(instrument)
    }
}

impl fmt::Debug for PrometheusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusClient")
            .field("handler_path", &self.handler_path)
            .field("collectors", &self.collectors.read().names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl StatsClient for PrometheusClient {
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()> {
        const OP: &str = "timing";
        let seconds = duration.as_secs_f64();

        self.with_instrument(name, |instrument| match instrument {
            Instrument::HistogramVec(vec) => {
                child(vec, name, OP, labels)?.observe(seconds);
                Ok(())
            }
            Instrument::Histogram(histogram) => {
                require_unlabeled(name, OP, labels)?;
                histogram.observe(seconds);
                Ok(())
            }
            other => Err(wrong_kind(name, OP, "a histogram", other)),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()> {
        const OP: &str = "incr";
        if value < 0 {
            return Err(StatsError::type_mismatch(
                name,
                OP,
                format!("counters are monotonic, got delta {value}"),
            ));
        }
        let delta = value as f64;

        self.with_instrument(name, |instrument| match instrument {
            Instrument::CounterVec(vec) => {
                child(vec, name, OP, labels)?.inc_by(delta);
                Ok(())
            }
            Instrument::Counter(counter) => {
                require_unlabeled(name, OP, labels)?;
                counter.inc_by(delta);
                Ok(())
            }
            other => Err(wrong_kind(name, OP, "a counter", other)),
        })
    }

    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()> {
        const OP: &str = "gauge";

        self.with_instrument(name, |instrument| match instrument {
            Instrument::GaugeVec(vec) => {
                child(vec, name, OP, labels)?.set(value);
                Ok(())
            }
            Instrument::Gauge(gauge) => {
                require_unlabeled(name, OP, labels)?;
                gauge.set(value);
                Ok(())
            }
            other => Err(wrong_kind(name, OP, "a gauge", other)),
        })
    }
}

/// Select the child of a vector instrument for the given labels.
fn child<B: MetricVecBuilder>(
    vec: &MetricVec<B>,
    name: &str,
    operation: &'static str,
    labels: &Labels,
) -> StatsResult<B::M> {
    let map = labels.as_map()?;
    vec.get_metric_with(&map).map_err(|e| StatsError::type_mismatch(name, operation, e.to_string()))
}

/// Reject any labels on a scalar instrument.
///
/// Runs before label conversion, so odd-length labels on a scalar are a
/// [`StatsError::TypeMismatch`] rather than [`StatsError::OddLength`]: the
/// shape error is the more useful of the two.
fn require_unlabeled(name: &str, operation: &'static str, labels: &Labels) -> StatsResult<()> {
    if labels.is_empty() {
        return Ok(());
    }
    Err(StatsError::type_mismatch(
        name,
        operation,
        format!("instrument takes no labels, got {labels}"),
    ))
}

fn wrong_kind(
    name: &str,
    operation: &'static str,
    expected: &str,
    found: &Instrument,
) -> StatsError {
    StatsError::type_mismatch(name, operation, format!("expected {expected}, found {}", found.kind()))
}

/// Renders a registry in the Prometheus text exposition format.
#[derive(Clone)]
pub struct ScrapeHandler {
    registry: Registry,
}

impl ScrapeHandler {
    /// Encode every metric family currently in the registry.
    ///
    /// # Errors
    /// Returns [`StatsError::Backend`] if encoding fails.
    pub fn render(&self) -> StatsResult<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer).map_err(|e| StatsError::backend(BACKEND, e))?;
        String::from_utf8(buffer).map_err(|e| StatsError::backend(BACKEND, e))
    }

    /// `Content-Type` header value for [`ScrapeHandler::render`] output.
    pub fn content_type(&self) -> &'static str {
        ::prometheus::TEXT_FORMAT
    }
}

impl fmt::Debug for ScrapeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use ::prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts};
    use statskit_common::labels;

    use super::*;

    fn client() -> PrometheusClient {
        let collectors = Collectors::new()
            .with(
                "sql_operation",
                HistogramVec::new(
                    HistogramOpts::new("sql_operation", "sql"),
                    &["driver", "operation"],
                )
                .unwrap(),
            )
            .with("startup", Histogram::with_opts(HistogramOpts::new("startup", "boot")).unwrap())
            .with(
                "requests",
                CounterVec::new(Opts::new("requests_total", "requests"), &["method"]).unwrap(),
            )
            .with("jobs", Counter::new("jobs_total", "jobs").unwrap())
            .with("depth", Gauge::new("queue_depth", "depth").unwrap());

        PrometheusClient::new(DEFAULT_HANDLER_PATH, collectors).unwrap()
    }

    #[test]
    fn test_timing_observes_seconds_on_labeled_histogram() {
        let client = client();
        client
            .timing(
                "sql_operation",
                &labels!["driver", "sqlite", "operation", "select"],
                Duration::from_millis(250),
            )
            .unwrap();

        let body = client.scrape_handler().render().unwrap();
        assert!(body.contains(
            r#"sql_operation_sum{driver="sqlite",operation="select"} 0.25"#
        ));
        assert!(body.contains(r#"sql_operation_count{driver="sqlite",operation="select"} 1"#));
    }

    #[test]
    fn test_unknown_metric() {
        let client = client();
        let err = client.timing("missing", &Labels::new(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, StatsError::UnknownMetric { ref metric } if metric == "missing"));
    }

    #[test]
    fn test_odd_labels_propagate() {
        let client = client();
        let err = client
            .timing("sql_operation", &labels!["driver"], Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, StatsError::OddLength { len: 1 }));
    }

    #[test]
    fn test_wrong_kind_is_type_mismatch() {
        let client = client();
        assert!(matches!(
            client.incr("sql_operation", &Labels::new(), 1),
            Err(StatsError::TypeMismatch { operation: "incr", .. })
        ));
        assert!(matches!(
            client.gauge("jobs", &Labels::new(), 1.0),
            Err(StatsError::TypeMismatch { operation: "gauge", .. })
        ));
        assert!(matches!(
            client.timing("depth", &Labels::new(), Duration::ZERO),
            Err(StatsError::TypeMismatch { operation: "timing", .. })
        ));
    }

    #[test]
    fn test_scalar_rejects_labels() {
        let client = client();
        let err = client.incr("jobs", &labels!["method", "GET"], 1).unwrap_err();
        assert!(matches!(err, StatsError::TypeMismatch { .. }));

        client.incr("jobs", &Labels::new(), 2).unwrap();
        client.timing("startup", &Labels::new(), Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_scalar_with_odd_labels_is_type_mismatch() {
        let client = client();
        let err = client.gauge("depth", &labels!["shard"], 1.0).unwrap_err();
        assert!(matches!(err, StatsError::TypeMismatch { operation: "gauge", .. }));
    }

    #[test]
    fn test_rejected_replacement_keeps_previous_instrument() {
        let client = client();
        // Same fully qualified name as the "depth" gauge.
        let clashing = Collectors::new().with("jobs", Counter::new("queue_depth", "clash").unwrap());

        let err = client.add_collectors(clashing).unwrap_err();
        assert!(matches!(err, StatsError::Backend { backend: "prometheus", .. }));

        assert!(client.has_collector("jobs"));
        client.incr("jobs", &Labels::new(), 4).unwrap();
        let body = client.scrape_handler().render().unwrap();
        assert!(body.contains("jobs_total 4"));
    }

    #[test]
    fn test_label_name_mismatch_is_type_mismatch() {
        let client = client();
        let err = client.incr("requests", &labels!["verb", "GET"], 1).unwrap_err();
        assert!(matches!(err, StatsError::TypeMismatch { .. }));

        let err = client
            .timing("sql_operation", &labels!["driver", "sqlite"], Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, StatsError::TypeMismatch { .. }));
    }

    #[test]
    fn test_negative_incr_rejected() {
        let client = client();
        let err = client.incr("requests", &labels!["method", "GET"], -1).unwrap_err();
        assert!(matches!(err, StatsError::TypeMismatch { .. }));
    }

    #[test]
    fn test_gauge_sets_absolute_value() {
        let client = client();
        client.gauge("depth", &Labels::new(), 7.0).unwrap();
        client.gauge("depth", &Labels::new(), 3.0).unwrap();

        let body = client.scrape_handler().render().unwrap();
        assert!(body.contains("queue_depth 3"));
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let client = client();
        let extra = Collectors::new().with("cache", Gauge::new("cache_entries", "entries").unwrap());

        client.add_collectors(extra.clone()).unwrap();
        client.add_collectors(extra).unwrap();
        assert!(client.has_collector("cache"));
        client.gauge("cache", &Labels::new(), 12.0).unwrap();

        client.remove_collectors(["cache"]);
        client.remove_collectors(["cache", "never-registered"]);
        assert!(!client.has_collector("cache"));
        assert!(matches!(
            client.gauge("cache", &Labels::new(), 1.0),
            Err(StatsError::UnknownMetric { .. })
        ));

        let body = client.scrape_handler().render().unwrap();
        assert!(!body.contains("cache_entries"));
    }

    #[test]
    fn test_add_replaces_existing_name() {
        let client = client();
        let replacement =
            Collectors::new().with("depth", Gauge::new("queue_depth_v2", "depth").unwrap());
        client.add_collectors(replacement).unwrap();

        client.gauge("depth", &Labels::new(), 5.0).unwrap();
        let body = client.scrape_handler().render().unwrap();
        assert!(body.contains("queue_depth_v2 5"));
        assert!(!body.contains("queue_depth 0"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let collectors = Collectors::new()
            .with("a", Counter::new("same_total", "a").unwrap())
            .with("b", Counter::new("same_total", "b").unwrap());
        let err = PrometheusClient::new(DEFAULT_HANDLER_PATH, collectors).unwrap_err();
        assert!(matches!(err, StatsError::Backend { backend: "prometheus", .. }));
    }

    #[test]
    fn test_add_handler_passes_path() {
        let client = client();
        let mut mounted = None;
        client.add_handler(|path, handler| {
            mounted = Some((path.to_string(), handler.content_type()));
        });

        let (path, content_type) = mounted.unwrap();
        assert_eq!(path, "/prometheus_metrics");
        assert!(content_type.starts_with("text/plain"));
    }

    #[test]
    fn test_clients_do_not_share_registries() {
        let a = client();
        let b = client();
        a.incr("jobs", &Labels::new(), 3).unwrap();

        assert!(a.scrape_handler().render().unwrap().contains("jobs_total 3"));
        assert!(b.scrape_handler().render().unwrap().contains("jobs_total 0"));
    }
}
