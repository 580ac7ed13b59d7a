//! Controller metrics

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Controller metrics registry
    pub static ref CONTROLLER_METRICS_REGISTRY: Registry = Registry::new();

    /// Ingress reconciliation duration
    static ref INGRESS_RECONCILIATION_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "ingress_reconciliation_duration_seconds",
            "Ingress reconciliation duration in seconds",
        );
        let histogram = HistogramVec::new(opts, &["namespace"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// Ingress reconciliations total
    static ref INGRESS_RECONCILIATIONS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "ingress_reconciliations_total",
            "Total number of ingress reconciliations",
        );
        let counter = IntCounterVec::new(opts, &["namespace", "result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Ingress status writes by outcome
    static ref INGRESS_STATUS_UPDATES_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "ingress_status_updates_total",
            "Ingress status updates by outcome (written, skipped, current, conflict, error)",
        );
        let counter = IntCounterVec::new(opts, &["result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };
}

/// Record one Ingress reconciliation
pub fn record_ingress_reconciliation(namespace: &str, duration_secs: f64, result: &str) {
    INGRESS_RECONCILIATION_DURATION
        .with_label_values(&[namespace])
        .observe(duration_secs);

    INGRESS_RECONCILIATIONS_TOTAL
        .with_label_values(&[namespace, result])
        .inc();
}

/// Record the outcome of a status comparison or write
pub fn record_status_update(result: &str) {
    INGRESS_STATUS_UPDATES_TOTAL
        .with_label_values(&[result])
        .inc();
}

/// Gather controller metrics in the Prometheus text format
pub fn gather_controller_metrics() -> Result<String, String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_metrics_recorded() {
        record_ingress_reconciliation("metrics-test", 0.012, "success");

        let metrics = gather_controller_metrics().expect("Should gather metrics");

        assert!(
            metrics.contains("ingress_reconciliations_total"),
            "Should contain counter metric"
        );
        assert!(
            metrics.contains("ingress_reconciliation_duration_seconds"),
            "Should contain histogram metric"
        );
    }

    #[test]
    fn test_status_update_metrics_recorded() {
        record_status_update("skipped");

        let metrics = gather_controller_metrics().expect("Should gather metrics");

        assert!(metrics.contains("ingress_status_updates_total"));
        assert!(metrics.contains("result=\"skipped\""));
    }
}
