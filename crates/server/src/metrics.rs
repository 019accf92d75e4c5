//! Prometheus metrics for the server process.
//!
//! Holds the HTTP request metrics and gauges refreshed from the store on
//! every scrape. The pipeline's own counters live in
//! `autotube_core::metrics` and are registered here as well.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autotube_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autotube_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "autotube_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics (collected dynamically)
// =============================================================================

/// Pipeline running state (1 = running, 0 = stopped).
pub static PIPELINE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "autotube_pipeline_running",
        "Whether the pipeline loops are running (1) or stopped (0)",
    )
    .unwrap()
});

/// Keywords by lifecycle state.
pub static KEYWORDS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("autotube_keywords_by_state", "Current keyword count by state"),
        &["state"],
    )
    .unwrap()
});

/// Uploads by visibility.
pub static UPLOADS_BY_VISIBILITY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "autotube_uploads_by_visibility",
            "Current upload count by visibility",
        ),
        &["visibility"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server_metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(PIPELINE_RUNNING.clone()),
        Box::new(KEYWORDS_BY_STATE.clone()),
        Box::new(UPLOADS_BY_VISIBILITY.clone()),
    ];

    for metric in server_metrics
        .into_iter()
        .chain(autotube_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(metric) {
            warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh the gauges from the pipeline and the store.
pub fn collect_dynamic_metrics(state: &AppState) {
    let status = match state.pipeline().status() {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "Failed to collect pipeline metrics");
            return;
        }
    };

    PIPELINE_RUNNING.set(i64::from(status.running));

    let keywords = &status.keywords;
    for (label, count) in [
        ("script_pending", keywords.script_pending),
        ("script_generating", keywords.script_generating),
        ("script_generated", keywords.script_generated),
        ("short_rendering", keywords.short_rendering),
        ("short_done", keywords.short_done),
        ("long_rendering", keywords.long_rendering),
        ("long_done", keywords.long_done),
    ] {
        KEYWORDS_BY_STATE.with_label_values(&[label]).set(count);
    }

    UPLOADS_BY_VISIBILITY
        .with_label_values(&["unlisted"])
        .set(status.uploads.unlisted);
    UPLOADS_BY_VISIBILITY
        .with_label_values(&["public"])
        .set(status.uploads.public);
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
