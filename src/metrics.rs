//! Prometheus metrics collection for recent-messages.
//!
//! Tracks feed throughput, store health, channel churn and export latency.
//! Everything is registered on one global registry and served by `/metrics`.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
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

/// Channel lines received from the feed.
pub static MESSAGES_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Lines successfully appended to the store.
pub static MESSAGES_APPENDED: OnceLock<IntCounter> = OnceLock::new();

/// Appends that failed.
pub static APPEND_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Exports served, by API version.
pub static EXPORTS_SERVED: OnceLock<IntCounterVec> = OnceLock::new();

/// Successful joins.
pub static CHANNELS_JOINED: OnceLock<IntCounter> = OnceLock::new();

/// Parts issued, by reason.
pub static CHANNELS_PARTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Per-channel vacuum failures.
pub static VACUUM_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Records removed by the expiry trim.
pub static EXPIRED_TRIMMED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Channels the feed is currently joined to.
pub static JOINED_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Channels the feed wants to be joined to.
pub static WANTED_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Time to load and transform one channel's log.
pub static EXPORT_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(MESSAGES_RECEIVED, IntCounter::new("rm_messages_received_total", "Channel lines received from the feed"));
    register!(MESSAGES_APPENDED, IntCounter::new("rm_messages_appended_total", "Lines appended to the message store"));
    register!(APPEND_FAILURES, IntCounter::new("rm_append_failures_total", "Failed message store appends"));
    register!(EXPORTS_SERVED, IntCounterVec::new(Opts::new("rm_exports_total", "Recent message exports served"), &["api"]));
    register!(CHANNELS_JOINED, IntCounter::new("rm_channels_joined_total", "Successful channel joins"));
    register!(CHANNELS_PARTED, IntCounterVec::new(Opts::new("rm_channels_parted_total", "Channel parts issued"), &["reason"]));
    register!(VACUUM_FAILURES, IntCounter::new("rm_vacuum_failures_total", "Per-channel vacuum failures"));
    register!(EXPIRED_TRIMMED, IntCounter::new("rm_expired_trimmed_total", "Stored records removed by expiry"));
    register!(JOINED_CHANNELS, IntGauge::new("rm_joined_channels", "Channels currently joined"));
    register!(WANTED_CHANNELS, IntGauge::new("rm_wanted_channels", "Channels the feed wants to be joined to"));
    register!(EXPORT_LATENCY, Histogram::with_opts(
        HistogramOpts::new("rm_export_duration_seconds", "Time to load and transform a channel log")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0])));
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
// Helper functions
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn record_received() {
    inc(&MESSAGES_RECEIVED);
}

#[inline]
pub fn record_appended() {
    inc(&MESSAGES_APPENDED);
}

#[inline]
pub fn record_append_failure() {
    inc(&APPEND_FAILURES);
}

#[inline]
pub fn record_joined() {
    inc(&CHANNELS_JOINED);
}

#[inline]
pub fn record_vacuum_failure() {
    inc(&VACUUM_FAILURES);
}

/// Record one export with its latency.
#[inline]
pub fn record_export(api: &str, duration_secs: f64) {
    if let Some(c) = EXPORTS_SERVED.get() {
        c.with_label_values(&[api]).inc();
    }
    if let Some(h) = EXPORT_LATENCY.get() {
        h.observe(duration_secs);
    }
}

#[inline]
pub fn record_parted(reason: &str) {
    if let Some(c) = CHANNELS_PARTED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_expired(count: usize) {
    if let Some(c) = EXPIRED_TRIMMED.get() {
        c.inc_by(count as u64);
    }
}

/// Update the joined/wanted channel gauges.
#[inline]
pub fn set_channel_counts(joined: usize, wanted: usize) {
    if let Some(g) = JOINED_CHANNELS.get() {
        g.set(joined as i64);
    }
    if let Some(g) = WANTED_CHANNELS.get() {
        g.set(wanted as i64);
    }
}
