//! Prometheus metrics for the show runtime
//!
//! This module provides metrics tracking for:
//! - Scheduler: current segment, segment activations, failed commands
//! - Cameras: health status, health poll duration, fallback activations
//! - Switcher: connection state, reconnect attempts
//! - Control API: request counts and latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_histogram_vec,
    CounterVec, Encoder, GaugeVec, Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for show runtime metrics
struct RuntimeMetrics {
    current_segment: GaugeVec,
    segment_activations: CounterVec,
    command_failures: CounterVec,
    camera_status: GaugeVec,
    health_poll_duration: Histogram,
    fallback_activations: CounterVec,
    switcher_connected: GaugeVec,
    reconnect_attempts: CounterVec,
}

/// Container for control API metrics
struct ApiMetrics {
    requests: CounterVec,
    duration: HistogramVec,
}

static RUNTIME_METRICS: OnceLock<RuntimeMetrics> = OnceLock::new();

static API_METRICS: OnceLock<ApiMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = showrunner::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics disabled");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let runtime = RuntimeMetrics {
        current_segment: register_gauge_vec!(
            "showrunner_current_segment_index",
            "Index of the on-air segment (-1 when stopped)",
            &["show"]
        )?,
        segment_activations: register_counter_vec!(
            "showrunner_segment_activations_total",
            "Segments put on air by type",
            &["show", "segment_type"]
        )?,
        command_failures: register_counter_vec!(
            "showrunner_command_failures_total",
            "Failed outbound commands by operation",
            &["show", "operation"]
        )?,
        camera_status: register_gauge_vec!(
            "showrunner_camera_status",
            "Camera health (0 = healthy, 1 = degraded, 2 = reconnecting, 3 = offline, -1 = unknown)",
            &["camera"]
        )?,
        health_poll_duration: register_histogram!(
            "showrunner_health_poll_duration_seconds",
            "Time spent fetching and classifying camera stats",
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?,
        fallback_activations: register_counter_vec!(
            "showrunner_fallback_activations_total",
            "Camera fallbacks activated by target kind",
            &["show", "target"]
        )?,
        switcher_connected: register_gauge_vec!(
            "showrunner_switcher_connected",
            "Whether the show's switcher connection is up (1 = yes, 0 = no)",
            &["show"]
        )?,
        reconnect_attempts: register_counter_vec!(
            "showrunner_switcher_reconnect_attempts_total",
            "Scheduled switcher reconnect attempts",
            &["show"]
        )?,
    };

    let api = ApiMetrics {
        requests: register_counter_vec!(
            "showrunner_api_requests_total",
            "Control API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        duration: register_histogram_vec!(
            "showrunner_api_request_duration_seconds",
            "Control API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    RUNTIME_METRICS
        .set(runtime)
        .map_err(|_| "Runtime metrics already initialized")?;
    API_METRICS
        .set(api)
        .map_err(|_| "API metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    RUNTIME_METRICS.get().is_some() && API_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn set_current_segment(show: &str, index: i64) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.current_segment.with_label_values(&[show]).set(index as f64);
    }
}

pub fn inc_segment_activations(show: &str, segment_type: &str) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.segment_activations
            .with_label_values(&[show, segment_type])
            .inc();
    }
}

pub fn inc_command_failures(show: &str, operation: &str) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.command_failures.with_label_values(&[show, operation]).inc();
    }
}

pub fn set_camera_status(camera: &str, value: f64) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.camera_status.with_label_values(&[camera]).set(value);
    }
}

/// `target` is "camera" or "standby"
pub fn inc_fallback_activations(show: &str, target: &str) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.fallback_activations
            .with_label_values(&[show, target])
            .inc();
    }
}

pub fn set_switcher_connected(show: &str, connected: bool) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.switcher_connected
            .with_label_values(&[show])
            .set(if connected { 1.0 } else { 0.0 });
    }
}

pub fn inc_reconnect_attempts(show: &str) {
    if let Some(m) = RUNTIME_METRICS.get() {
        m.reconnect_attempts.with_label_values(&[show]).inc();
    }
}

/// Record a control API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = API_METRICS.get() else {
        return;
    };

    let status = status.to_string();
    m.requests
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    m.duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// RAII timer that records elapsed time when dropped
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.observe_duration();
        }
    }
}

/// Start timing one camera health poll
pub fn start_poll_timer() -> MetricsTimer {
    match RUNTIME_METRICS.get() {
        Some(m) => MetricsTimer::new(m.health_poll_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics() {
        assert!(init_metrics().is_ok());
        // Idempotent
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_metrics_initialized() {
        ensure_metrics_initialized();
        assert!(metrics_initialized());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        set_current_segment("encode-test", 3);
        let text = encode_metrics().unwrap();
        assert!(text.contains("showrunner_current_segment_index"));
    }

    #[test]
    fn test_runtime_metrics() {
        ensure_metrics_initialized();
        set_current_segment("finals", 2);
        inc_segment_activations("finals", "live");
        inc_command_failures("finals", "set_scene");
        set_camera_status("cam1", 2.0);
        inc_fallback_activations("finals", "camera");
        set_switcher_connected("finals", true);
        inc_reconnect_attempts("finals");
        record_api_request("/api/shows", 200, 0.004);
        let _timer = start_poll_timer();
    }

    #[test]
    fn test_metrics_noop_without_init() {
        // Must not panic whether or not another test initialized the registry
        set_current_segment("test", -1);
        inc_command_failures("test", "restart_media");
        set_switcher_connected("test", false);
        let _timer = start_poll_timer();
    }
}
