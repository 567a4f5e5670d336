//! Storage metrics collection.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Batch item counters by outcome

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total object-store and download requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "storage_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "storage_latency_seconds";

    /// Batch items by operation and outcome.
    pub const BATCH_ITEMS_TOTAL: &str = "storage_batch_items_total";
}

/// Record metrics for a completed request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record the outcome counts of a batch.
pub fn record_batch(operation: &str, succeeded: usize, failed: usize) {
    counter!(
        names::BATCH_ITEMS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => "ok"
    )
    .increment(succeeded as u64);

    counter!(
        names::BATCH_ITEMS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => "error"
    )
    .increment(failed as u64);
}
