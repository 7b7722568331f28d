use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use statskit_common::stats::warn_on_failure;
use statskit_common::{labels, StatsClient};

use crate::observability::prometheus::{API_REQUEST_DURATION, SIMPLE_API_REQUEST_DURATION};

/// Predicate deciding whether a request bypasses timing.
pub type Skipper = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Rewrites a URI path before it becomes a label, e.g. to strip ids.
pub type PathSanitizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// State shared by the timing middleware.
///
/// ```rust
/// use std::sync::Arc;
///
/// use axum::routing::get;
/// use axum::{middleware, Router};
/// use statskit_common::NoOpStatsClient;
/// use statskit_infra::api::{request_stats_middleware, StatsMiddlewareState};
///
/// let state = StatsMiddlewareState::new(Arc::new(NoOpStatsClient))
///     .with_skipper(|req| req.uri().path() == "/health");
///
/// let app: Router = Router::new()
///     .route("/users/{id}", get(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(state, request_stats_middleware));
/// ```
#[derive(Clone)]
pub struct StatsMiddlewareState {
    stats: Arc<dyn StatsClient>,
    skipper: Option<Skipper>,
    sanitizer: Option<PathSanitizer>,
}

impl StatsMiddlewareState {
    /// Time every request and report to `stats`.
    pub fn new(stats: Arc<dyn StatsClient>) -> Self {
        Self { stats, skipper: None, sanitizer: None }
    }

    /// Skip timing for requests matching `skipper`.
    #[must_use]
    pub fn with_skipper<F>(mut self, skipper: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skipper = Some(Arc::new(skipper));
        self
    }

    /// Pass URI paths through `sanitizer` before labelling.
    #[must_use]
    pub fn with_sanitizer<F>(mut self, sanitizer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.sanitizer = Some(Arc::new(sanitizer));
        self
    }

    fn skips(&self, request: &Request) -> bool {
        self.skipper.as_ref().is_some_and(|skip| skip(request))
    }

    fn uri_path(&self, request: &Request) -> String {
        let path = request.uri().path();
        match &self.sanitizer {
            Some(sanitize) => sanitize(path),
            None => path.to_string(),
        }
    }
}

impl fmt::Debug for StatsMiddlewareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsMiddlewareState")
            .field("stats", &self.stats)
            .field("skipper", &self.skipper.is_some())
            .field("sanitizer", &self.sanitizer.is_some())
            .finish()
    }
}

/// Time the inner handler and report `api_request_duration`.
///
/// `path` is the route template (`/users/{id}`) when the router matched one,
/// otherwise the URI path after sanitising.
pub async fn request_stats_middleware(
    State(state): State<StatsMiddlewareState>,
    request: Request,
    next: Next,
) -> Response {
    if state.skips(&request) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => state.uri_path(&request),
    };

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let code = response.status().as_u16().to_string();
    let labels = labels!["path", path, "code", code, "method", method];
    warn_on_failure(API_REQUEST_DURATION, state.stats.timing(API_REQUEST_DURATION, &labels, elapsed));

    response
}

/// Time the inner handler and report `simple_api_request_duration`.
pub async fn simple_stats_middleware(
    State(state): State<StatsMiddlewareState>,
    request: Request,
    next: Next,
) -> Response {
    if state.skips(&request) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let path = state.uri_path(&request);

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let labels = labels!["path", path, "method", method];
    warn_on_failure(
        SIMPLE_API_REQUEST_DURATION,
        state.stats.timing(SIMPLE_API_REQUEST_DURATION, &labels, elapsed),
    );

    response
}

/// Replace numeric and UUID path segments with `:id`.
///
/// Ready-made [`PathSanitizer`] body for routers without route templates.
///
/// ```
/// use statskit_infra::api::normalize_path;
///
/// assert_eq!(normalize_path("/users/12345/profile"), "/users/:id/profile");
/// assert_eq!(normalize_path("/api/health/"), "/api/health");
/// ```
pub fn normalize_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return "/".to_string();
    }

    path.split('/')
        .map(|seg| if is_uuid(seg) || is_numeric(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(s: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use statskit_common::testing::RecordingStatsClient;
    use tower::ServiceExt;

    use super::*;

    fn router(state: StatsMiddlewareState) -> Router {
        Router::new()
            .route("/users/{id}", get(|| async { "user" }))
            .route("/health", get(|| async { "ok" }))
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .layer(middleware::from_fn_with_state(state, request_stats_middleware))
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn records_route_template_code_and_method() {
        let stats = RecordingStatsClient::new();
        let app = router(StatsMiddlewareState::new(Arc::new(stats.clone())));

        let response = app.oneshot(get_request("/users/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let timings = stats.timings(API_REQUEST_DURATION);
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].label("path"), Some("/users/{id}"));
        assert_eq!(timings[0].label("code"), Some("200"));
        assert_eq!(timings[0].label("method"), Some("GET"));
    }

    #[tokio::test]
    async fn handler_status_is_reported_and_returned() {
        let stats = RecordingStatsClient::new();
        let app = router(StatsMiddlewareState::new(Arc::new(stats.clone())));

        let response = app.oneshot(get_request("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(stats.timings(API_REQUEST_DURATION)[0].label("code"), Some("500"));
    }

    #[tokio::test]
    async fn skipper_bypasses_timing() {
        let stats = RecordingStatsClient::new();
        let state = StatsMiddlewareState::new(Arc::new(stats.clone()))
            .with_skipper(|req| req.uri().path() == "/health");
        let app = router(state);

        let response = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(stats.calls().is_empty());

        app.oneshot(get_request("/users/7")).await.unwrap();
        assert_eq!(stats.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_emission_keeps_response() {
        let stats = RecordingStatsClient::failing();
        let app = router(StatsMiddlewareState::new(Arc::new(stats.clone())));

        let response = app.oneshot(get_request("/users/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stats.calls().len(), 1);
    }

    #[tokio::test]
    async fn simple_middleware_uses_sanitised_uri_path() {
        let stats = RecordingStatsClient::new();
        let state = StatsMiddlewareState::new(Arc::new(stats.clone())).with_sanitizer(normalize_path);
        let app = Router::new()
            .route("/users/{id}", get(|| async { "user" }))
            .layer(middleware::from_fn_with_state(state, simple_stats_middleware));

        app.oneshot(get_request("/users/550e8400-e29b-41d4-a716-446655440000")).await.unwrap();

        let timing = &stats.timings(SIMPLE_API_REQUEST_DURATION)[0];
        assert_eq!(timing.label("path"), Some("/users/:id"));
        assert_eq!(timing.label("method"), Some("GET"));
        assert_eq!(timing.label("code"), None);
    }

    #[test]
    fn normalize_path_rules() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/jobs/ABCDEF12-3456-7890-ABCD-EF1234567890/status"), "/jobs/:id/status");
        assert_eq!(normalize_path("/items/0/details"), "/items/:id/details");
        assert_eq!(normalize_path("/v1/users"), "/v1/users");
    }
}
