//! Prometheus-based metrics module
//!
//! Session and traffic counters for the dispatcher and outbound handlers.
//! `gather_text` renders the registry in the Prometheus text format.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::error::{Error, Result};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // === Dispatcher Metrics ===

    /// Total sessions dispatched
    pub static ref DISPATCHER_SESSIONS_TOTAL: IntCounter = IntCounter::new(
        "proxylink_dispatcher_sessions_total",
        "Total number of sessions dispatched"
    ).unwrap();

    /// Currently active sessions
    pub static ref DISPATCHER_SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "proxylink_dispatcher_sessions_active",
        "Number of currently active sessions"
    ).unwrap();

    /// Failed sessions (routing errors and outbound failures)
    pub static ref DISPATCHER_SESSIONS_FAILED: IntCounter = IntCounter::new(
        "proxylink_dispatcher_sessions_failed_total",
        "Total number of failed sessions"
    ).unwrap();

    // === Traffic Metrics ===

    /// Total bytes uploaded (global)
    pub static ref TRAFFIC_BYTES_UPLOADED: IntCounter = IntCounter::new(
        "proxylink_traffic_bytes_uploaded_total",
        "Total bytes uploaded"
    ).unwrap();

    /// Total bytes downloaded (global)
    pub static ref TRAFFIC_BYTES_DOWNLOADED: IntCounter = IntCounter::new(
        "proxylink_traffic_bytes_downloaded_total",
        "Total bytes downloaded"
    ).unwrap();

    // === Outbound Metrics ===

    /// Sessions per outbound
    pub static ref OUTBOUND_SESSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("proxylink_outbound_sessions_total", "Total sessions per outbound"),
        &["tag"]
    ).unwrap();

    /// Active sessions per outbound
    pub static ref OUTBOUND_SESSIONS_ACTIVE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("proxylink_outbound_sessions_active", "Active sessions per outbound"),
        &["tag"]
    ).unwrap();

    /// Bytes uploaded per outbound
    pub static ref OUTBOUND_BYTES_UPLOADED: IntCounterVec = IntCounterVec::new(
        Opts::new("proxylink_outbound_bytes_uploaded_total", "Bytes uploaded per outbound"),
        &["tag"]
    ).unwrap();

    /// Bytes downloaded per outbound
    pub static ref OUTBOUND_BYTES_DOWNLOADED: IntCounterVec = IntCounterVec::new(
        Opts::new("proxylink_outbound_bytes_downloaded_total", "Bytes downloaded per outbound"),
        &["tag"]
    ).unwrap();

    // === Session Duration ===

    /// Session duration histogram
    pub static ref SESSION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "proxylink_session_duration_seconds",
            "Session duration in seconds"
        ).buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["outbound"]
    ).unwrap();
}

/// Initialize and register all metrics with the global registry
///
/// Safe to call more than once; duplicate registrations are ignored.
pub fn init_metrics() {
    REGISTRY.register(Box::new(DISPATCHER_SESSIONS_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(DISPATCHER_SESSIONS_ACTIVE.clone())).ok();
    REGISTRY.register(Box::new(DISPATCHER_SESSIONS_FAILED.clone())).ok();

    REGISTRY.register(Box::new(TRAFFIC_BYTES_UPLOADED.clone())).ok();
    REGISTRY.register(Box::new(TRAFFIC_BYTES_DOWNLOADED.clone())).ok();

    REGISTRY.register(Box::new(OUTBOUND_SESSIONS_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(OUTBOUND_SESSIONS_ACTIVE.clone())).ok();
    REGISTRY.register(Box::new(OUTBOUND_BYTES_UPLOADED.clone())).ok();
    REGISTRY.register(Box::new(OUTBOUND_BYTES_DOWNLOADED.clone())).ok();

    REGISTRY.register(Box::new(SESSION_DURATION_SECONDS.clone())).ok();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| Error::Config(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Config(format!("Invalid metrics text: {}", e)))
}

/// Per-session metrics, recorded when the session ends
pub struct SessionMetrics {
    outbound_tag: String,
    start_time: std::time::Instant,
}

impl SessionMetrics {
    pub fn start(outbound_tag: &str) -> Self {
        DISPATCHER_SESSIONS_TOTAL.inc();
        DISPATCHER_SESSIONS_ACTIVE.inc();
        OUTBOUND_SESSIONS_TOTAL.with_label_values(&[outbound_tag]).inc();
        OUTBOUND_SESSIONS_ACTIVE.with_label_values(&[outbound_tag]).inc();

        Self {
            outbound_tag: outbound_tag.to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Time since the session started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Record completion with duration
    pub fn finish(self, failed: bool) {
        DISPATCHER_SESSIONS_ACTIVE.dec();
        OUTBOUND_SESSIONS_ACTIVE
            .with_label_values(&[&self.outbound_tag])
            .dec();
        if failed {
            DISPATCHER_SESSIONS_FAILED.inc();
        }
        SESSION_DURATION_SECONDS
            .with_label_values(&[&self.outbound_tag])
            .observe(self.start_time.elapsed().as_secs_f64());
    }
}

/// Count relayed bytes for an outbound
pub fn record_upload(outbound_tag: &str, bytes: u64) {
    TRAFFIC_BYTES_UPLOADED.inc_by(bytes);
    OUTBOUND_BYTES_UPLOADED
        .with_label_values(&[outbound_tag])
        .inc_by(bytes);
}

pub fn record_download(outbound_tag: &str, bytes: u64) {
    TRAFFIC_BYTES_DOWNLOADED.inc_by(bytes);
    OUTBOUND_BYTES_DOWNLOADED
        .with_label_values(&[outbound_tag])
        .inc_by(bytes);
}

/// Format bytes to human readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
