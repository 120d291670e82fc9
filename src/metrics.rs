//! Prometheus metrics collection for pbxd.
//!
//! Tracks exchange occupancy, command throughput and call outcomes,
//! exposed on an HTTP endpoint for scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Total calls that reached the connected state.
pub static CALLS_CONNECTED: OnceLock<IntCounter> = OnceLock::new();

/// Total chat messages relayed between connected peers.
pub static CHATS_RELAYED: OnceLock<IntCounter> = OnceLock::new();

/// Registrations refused, by reason.
pub static REGISTRATIONS_REFUSED: OnceLock<IntCounterVec> = OnceLock::new();

/// Commands processed by type (pickup, hangup, dial, chat).
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command processing latency by command type.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Command outcomes that failed, by command and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently registered extensions.
pub static REGISTERED_EXTENSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        CALLS_CONNECTED,
        IntCounter::new("pbx_calls_connected_total", "Calls that reached CONNECTED")
    );
    register!(
        CHATS_RELAYED,
        IntCounter::new("pbx_chats_relayed_total", "Chat messages relayed to peers")
    );
    register!(
        REGISTRATIONS_REFUSED,
        IntCounterVec::new(
            Opts::new("pbx_registrations_refused_total", "Registrations refused by reason"),
            &["reason"]
        )
    );
    register!(
        COMMAND_COUNTER,
        IntCounterVec::new(
            Opts::new("pbx_command_total", "Commands processed by type"),
            &["command"]
        )
    );
    register!(
        COMMAND_LATENCY,
        HistogramVec::new(
            HistogramOpts::new("pbx_command_duration_seconds", "Command latency by type")
                .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["command"]
        )
    );
    register!(
        COMMAND_ERRORS,
        IntCounterVec::new(
            Opts::new("pbx_command_errors_total", "Failed command outcomes"),
            &["command", "error"]
        )
    );
    register!(
        REGISTERED_EXTENSIONS,
        IntGauge::new("pbx_registered_extensions", "Currently registered extensions")
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a failed command outcome.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

/// Record a refused registration.
#[inline]
pub fn record_registration_refused(reason: &str) {
    if let Some(c) = REGISTRATIONS_REFUSED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// Record a call reaching the connected state.
#[inline]
pub fn record_call_connected() {
    if let Some(c) = CALLS_CONNECTED.get() {
        c.inc();
    }
}

/// Record a relayed chat message.
#[inline]
pub fn record_chat_relayed() {
    if let Some(c) = CHATS_RELAYED.get() {
        c.inc();
    }
}

/// Update the registered extensions gauge.
#[inline]
pub fn set_registered_extensions(count: i64) {
    if let Some(g) = REGISTERED_EXTENSIONS.get() {
        g.set(count);
    }
}
