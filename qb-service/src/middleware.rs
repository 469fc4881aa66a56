//! Middleware Stack
//!
//! Applied around the query router: CORS, tracing, request timeout and
//! request logging.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::time::{Duration, Instant};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

/// Middleware configuration
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Browser origins allowed to call the API with credentials.
    /// Empty disables CORS.
    pub cors_origins: Vec<String>,
    /// Whole-request timeout
    pub timeout: Duration,
    pub request_logging: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec!["http://localhost:3000".to_string()],
            timeout: Duration::from_secs(120),
            request_logging: true,
        }
    }
}

/// Apply the middleware stack to a router
pub fn apply(router: Router, config: &MiddlewareConfig) -> Router {
    let mut router = router;

    if config.request_logging {
        router = router.layer(middleware::from_fn(request_logging_middleware));
    }

    router = router.layer(TimeoutLayer::new(config.timeout));

    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    // CORS (outermost - runs first on request)
    if !config.cors_origins.is_empty() {
        router = router.layer(cors_layer(&config.cors_origins));
    }

    router
}

/// Credentials are allowed, so methods and headers mirror the request
/// instead of using a wildcard.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Request logging middleware
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            "{} {} {} - {}ms",
            method,
            uri,
            status.as_u16(),
            duration.as_millis()
        );
    } else if status.is_client_error() {
        tracing::warn!(
            "{} {} {} - {}ms",
            method,
            uri,
            status.as_u16(),
            duration.as_millis()
        );
    } else {
        tracing::info!(
            "{} {} {} - {}ms",
            method,
            uri,
            status.as_u16(),
            duration.as_millis()
        );
    }

    response
}
