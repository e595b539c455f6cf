/// Metrics and telemetry for toolhub
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Read cache hits, misses, errors and invalidations
/// - Aggregate maintenance on tool records
/// - Moderation actions and analytics tracking

use lazy_static::lazy_static;
use std::time::Instant;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    Gauge, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Cache Metrics ==========

    /// Cache hits by cache kind
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type"]
    )
    .unwrap();

    /// Cache misses by cache kind
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type"]
    )
    .unwrap();

    /// Swallowed cache backend failures by operation
    pub static ref CACHE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_errors_total",
        "Total number of cache backend failures",
        &["operation"]
    )
    .unwrap();

    /// Keys removed by write-path invalidation
    pub static ref CACHE_INVALIDATED_KEYS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_invalidated_keys_total",
        "Total number of cache keys invalidated by writes",
        &["scope"]
    )
    .unwrap();

    // ========== Aggregate Metrics ==========

    /// Counter-group updates on tool records
    pub static ref AGGREGATE_UPDATES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aggregate_updates_total",
        "Total number of tool aggregate updates",
        &["group"]
    )
    .unwrap();

    // ========== Moderation Metrics ==========

    /// Moderation actions by action type
    pub static ref MODERATION_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "moderation_actions_total",
        "Total number of moderation actions",
        &["action_type", "target_type"]
    )
    .unwrap();

    /// Comment reports by reason
    pub static ref REPORTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reports_created_total",
        "Total number of comment reports created",
        &["reason"]
    )
    .unwrap();

    // ========== Analytics Metrics ==========

    /// Tracked events by kind and outcome
    pub static ref ANALYTICS_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "analytics_events_total",
        "Total number of tracked view and click events",
        &["kind", "status"]
    )
    .unwrap();

    // ========== Media Metrics ==========

    /// Media uploads by media type
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Total number of media uploads",
        &["media_type"]
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Account creations by sign-up method
    pub static ref ACCOUNT_CREATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "account_creations_total",
        "Total number of accounts created",
        &["method"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();

    static ref STARTED_AT: Instant = Instant::now();
}

/// Pin the uptime origin to process start
pub fn mark_started() {
    lazy_static::initialize(&STARTED_AT);
}

/// Refresh the uptime gauge and return its value
pub fn update_uptime() -> f64 {
    let uptime = STARTED_AT.elapsed().as_secs_f64();
    UPTIME_SECONDS.set(uptime);
    uptime
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    update_uptime();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a cache access
pub fn record_cache_access(cache_type: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[cache_type]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[cache_type]).inc();
    }
}

/// Record a swallowed cache failure
pub fn record_cache_error(operation: &str) {
    CACHE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

/// Record keys removed by invalidation
pub fn record_invalidation(scope: &str, keys: u64) {
    CACHE_INVALIDATED_KEYS_TOTAL
        .with_label_values(&[scope])
        .inc_by(keys);
}

/// Record an aggregate update on a tool
pub fn record_aggregate_update(group: &str) {
    AGGREGATE_UPDATES_TOTAL.with_label_values(&[group]).inc();
}

/// Record a moderation action
pub fn record_moderation_action(action_type: &str, target_type: &str) {
    MODERATION_ACTIONS_TOTAL
        .with_label_values(&[action_type, target_type])
        .inc();
}

/// Record a comment report
pub fn record_report_created(reason: &str) {
    REPORTS_CREATED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a tracked view or click
pub fn record_analytics_event(kind: &str, success: bool) {
    ANALYTICS_EVENTS_TOTAL
        .with_label_values(&[kind, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a media upload
pub fn record_media_upload(media_type: &str) {
    MEDIA_UPLOADS_TOTAL.with_label_values(&[media_type]).inc();
}

/// Record an account creation
pub fn record_account_creation(method: &str) {
    ACCOUNT_CREATIONS_TOTAL.with_label_values(&[method]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_cache_access("tool", true);
        record_cache_access("tool", false);
        record_invalidation("tool", 3);

        let output = render_metrics();
        assert!(output.contains("cache_hits_total"));
        assert!(output.contains("cache_invalidated_keys_total"));
    }

    #[test]
    fn test_http_request_recording() {
        record_http_request("GET", "/api/tools", 200, 0.01);
        let count = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/tools", "200"])
            .get();
        assert!(count >= 1);
    }
}
