// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order workflow
// ============================================================================
//
// Provides metrics for:
// - Line items added (new row vs. merged into an existing one)
// - Completed payments by method
// - Rejected operations by error code
// - Merge retries after a uniqueness race
// - Operation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub line_items_added: IntCounterVec,
    pub payments_completed: IntCounterVec,
    pub operations_rejected: IntCounterVec,
    pub merge_retries: IntCounter,
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let line_items_added = IntCounterVec::new(
            Opts::new("order_line_items_added_total", "Line items added to orders"),
            &["outcome"],
        )?;
        registry.register(Box::new(line_items_added.clone()))?;

        let payments_completed = IntCounterVec::new(
            Opts::new("order_payments_completed_total", "Orders moved to paid"),
            &["method"],
        )?;
        registry.register(Box::new(payments_completed.clone()))?;

        let operations_rejected = IntCounterVec::new(
            Opts::new("order_operations_rejected_total", "Order operations that returned an error"),
            &["operation", "code"],
        )?;
        registry.register(Box::new(operations_rejected.clone()))?;

        let merge_retries = IntCounter::new(
            "order_line_item_merge_retries_total",
            "Merges retried after losing a uniqueness race",
        )?;
        registry.register(Box::new(merge_retries.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Order operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            line_items_added,
            payments_completed,
            operations_rejected,
            merge_retries,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `merged` is true when the quantity was folded into an existing line.
    pub fn record_line_item(&self, merged: bool) {
        let outcome = if merged { "merged" } else { "created" };
        self.line_items_added.with_label_values(&[outcome]).inc();
    }

    pub fn record_payment(&self, method: &str) {
        self.payments_completed.with_label_values(&[method]).inc();
    }

    pub fn record_rejection(&self, operation: &str, code: &str) {
        self.operations_rejected.with_label_values(&[operation, code]).inc();
    }

    pub fn record_merge_retry(&self) {
        self.merge_retries.inc();
    }

    pub fn observe_duration(&self, operation: &str, duration_secs: f64) {
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }
}
