//! Prometheus metrics for the mail server
//!
//! Registered in the default registry; scrape with [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};

lazy_static! {
    /// Histogram: duration of one poll iteration (seconds)
    pub static ref POLL_DURATION: Histogram = register_histogram!(
        "mailtm_poll_duration_seconds",
        "Duration of one poll iteration, fetch through dispatch",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create poll_duration metric");

    /// Counter: poll iterations by outcome
    pub static ref POLL_CYCLES: CounterVec = register_counter_vec!(
        "mailtm_poll_cycles_total",
        "Poll iterations by outcome",
        &["status"]
    )
    .expect("Failed to create poll_cycles metric");

    /// Counter: events handed to the registry by kind
    pub static ref EVENTS_DISPATCHED: CounterVec = register_counter_vec!(
        "mailtm_events_dispatched_total",
        "Events dispatched by kind",
        &["kind"]
    )
    .expect("Failed to create events_dispatched metric");

    /// Counter: failed remote calls by operation
    pub static ref REMOTE_ERRORS: CounterVec = register_counter_vec!(
        "mailtm_remote_errors_total",
        "Failed remote calls by operation",
        &["operation"]
    )
    .expect("Failed to create remote_errors metric");

    /// Counter: handler failures (errors and panics) by event kind
    pub static ref HANDLER_ERRORS: CounterVec = register_counter_vec!(
        "mailtm_handler_errors_total",
        "Handler failures by event kind",
        &["kind"]
    )
    .expect("Failed to create handler_errors metric");

    /// Gauge: entries in the snapshot cache
    pub static ref CACHE_SIZE: Gauge = register_gauge!(
        "mailtm_cache_entries",
        "Entries held in the snapshot cache"
    )
    .expect("Failed to create cache_entries metric");

    /// Gauge: running runners
    pub static ref RUNNING: Gauge = register_gauge!(
        "mailtm_runners_running",
        "Poll runners currently running"
    )
    .expect("Failed to create runners_running metric");
}

pub fn record_poll(duration_secs: f64, status: &str) {
    POLL_DURATION.observe(duration_secs);
    POLL_CYCLES.with_label_values(&[status]).inc();
}

pub fn record_event(kind: &str) {
    EVENTS_DISPATCHED.with_label_values(&[kind]).inc();
}

pub fn record_remote_error(operation: &str) {
    REMOTE_ERRORS.with_label_values(&[operation]).inc();
}

pub fn record_handler_error(kind: &str) {
    HANDLER_ERRORS.with_label_values(&[kind]).inc();
}

pub fn set_cache_size(size: usize) {
    CACHE_SIZE.set(size as f64);
}

pub fn runner_started() {
    RUNNING.inc();
}

pub fn runner_stopped() {
    RUNNING.dec();
}

/// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_show_up_in_output() {
        record_poll(0.2, "ok");
        record_event("new_message");
        record_remote_error("list_messages");
        record_handler_error("new_message");
        set_cache_size(3);

        let output = encode_metrics();
        assert!(output.contains("mailtm_poll_duration_seconds"));
        assert!(output.contains("mailtm_poll_cycles_total"));
        assert!(output.contains("mailtm_events_dispatched_total"));
        assert!(output.contains("mailtm_remote_errors_total"));
        assert!(output.contains("mailtm_handler_errors_total"));
        assert!(output.contains("mailtm_cache_entries"));
    }
}
