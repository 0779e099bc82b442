//! Per-query timing, slow-query warnings, write audit lines and process-wide counters.
//!
//! Lines go through the `log` facade on dedicated targets so the log4rs configuration in
//! [`crate::logger`] can route them to their own files.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const AUDIT_TARGET: &str = "plp_bookstore::audit";
pub const METRICS_TARGET: &str = "plp_bookstore::metrics";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub enable_audit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { slow_query_ms: 500, enable_audit: true }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub index_scans_total: AtomicU64,
    pub writes_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub index_scans_total: u64,
    pub writes_total: u64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}

pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}

pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Records one executed query (reads and the matching step of writes). Queries at or above the slow threshold are logged at WARN.
pub fn log_query(
    collection: &str,
    op: &str,
    filter_dbg: &str,
    duration_ms: u64,
    n_returned: usize,
    index_name: Option<&str>,
) {
    let m = &TELEMETRY.metrics;
    m.queries_total.fetch_add(1, Ordering::Relaxed);
    if index_name.is_some() {
        m.index_scans_total.fetch_add(1, Ordering::Relaxed);
    }
    let slow_ms = TELEMETRY.cfg.read().slow_query_ms;
    let line = serde_json::json!({
        "ts": now_ts(),
        "op": op,
        "collection": collection,
        "filter": filter_dbg,
        "duration_ms": duration_ms,
        "n_returned": n_returned,
        "index": index_name,
    });
    if duration_ms >= slow_ms {
        m.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!(target: METRICS_TARGET, "slow query {line}");
    } else {
        log::debug!(target: METRICS_TARGET, "{line}");
    }
}

/// Records one write against a document.
pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    let line = format!("{} op={op} collection={collection} id={doc_id}", now_ts());
    log::info!(target: AUDIT_TARGET, "{line}");
    if let Some(sink) = TELEMETRY.audit_sink.read().as_ref() {
        sink.write().push(line);
    }
}

#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        queries_total: m.queries_total.load(Ordering::Relaxed),
        queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
        index_scans_total: m.index_scans_total.load(Ordering::Relaxed),
        writes_total: m.writes_total.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_grow() {
        let before = metrics_snapshot();
        log_query("books", "find", "True", 0, 3, Some("title_1"));
        log_audit("insert", "books", "abc");
        let after = metrics_snapshot();
        assert!(after.queries_total > before.queries_total);
        assert!(after.index_scans_total > before.index_scans_total);
        assert!(after.writes_total > before.writes_total);
    }
}
