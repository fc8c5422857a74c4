//! Metrics for store operations.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use std::time::Instant;

/// Backend label attached to every metric.
pub const BACKEND: &str = "sqlite";

/// Records count and latency of one store operation.
///
/// Emits:
/// 1. `storage_operations_total` - counter by backend, operation and status
/// 2. `storage_operation_duration_ms` - latency histogram with the same labels
///
/// # Examples
///
/// ```ignore
/// use std::time::Instant;
/// use vitedb::storage::sqlite::{record_operation_metrics, status_label};
///
/// let start = Instant::now();
/// let result = db.insert("links", &values);
/// record_operation_metrics("insert", start, status_label(&result));
/// ```
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => BACKEND,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => BACKEND,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Maps a result to the `status` label.
#[must_use]
pub const fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}
