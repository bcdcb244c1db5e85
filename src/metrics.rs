/// Metrics and telemetry for the group gate
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Cache hit/miss rates and background refreshes
/// - Identity config load times
/// - Verification outcomes

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, Gauge, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
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

    // ========== Cache Metrics ==========

    /// Cache hits by cache type
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type"]
    )
    .unwrap();

    /// Cache misses by cache type
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type"]
    )
    .unwrap();

    /// Background refreshes by cache type and status
    pub static ref CACHE_REFRESHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_refreshes_total",
        "Total number of background cache refreshes",
        &["cache_type", "status"]
    )
    .unwrap();

    /// Entries held after the last sweep
    pub static ref CACHE_SIZE: IntGaugeVec = register_int_gauge_vec!(
        "cache_size",
        "Number of entries in cache",
        &["cache_type"]
    )
    .unwrap();

    // ========== Content Metrics ==========

    /// Identity config loads from the content root
    pub static ref CONFIG_LOAD_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "config_load_duration_seconds",
        "Identity config load time in seconds",
        &["outcome"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // ========== Verification Metrics ==========

    /// Verification submissions by outcome
    pub static ref VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "verifications_total",
        "Total number of verification submissions",
        &["outcome"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
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

/// Record a background refresh of one entry
pub fn record_cache_refresh(cache_type: &str, status: &str) {
    CACHE_REFRESHES_TOTAL
        .with_label_values(&[cache_type, status])
        .inc();
}

pub fn set_cache_size(cache_type: &str, size: usize) {
    CACHE_SIZE
        .with_label_values(&[cache_type])
        .set(size as i64);
}

/// Record an identity config load
pub fn record_config_load(outcome: &str, duration: f64) {
    CONFIG_LOAD_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration);
}

/// Record a verification outcome
pub fn record_verification(outcome: &str) {
    VERIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/identities", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_cache_access() {
        record_cache_access("identity_config", true);
        record_cache_access("identity_config", false);
        let metrics = render_metrics();
        assert!(metrics.contains("cache_hits_total"));
        assert!(metrics.contains("cache_misses_total"));
    }

    #[test]
    fn test_record_verification() {
        record_verification("verified");
        record_verification("not_verified");
        let metrics = render_metrics();
        assert!(metrics.contains("verifications_total"));
    }

    #[test]
    fn test_cache_refresh_and_size() {
        record_cache_refresh("identity_list", "success");
        set_cache_size("identity_list", 3);
        let metrics = render_metrics();
        assert!(metrics.contains("cache_refreshes_total"));
        assert!(metrics.contains("cache_size"));
    }
}
