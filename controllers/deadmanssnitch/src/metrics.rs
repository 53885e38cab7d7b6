//! Prometheus metrics.
//!
//! Metrics live in a [`Metrics`] value registered against a caller-owned
//! [`Registry`], so tests can build isolated instances.

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

/// Controller metrics
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Reconciliation passes started
    pub reconciliations_total: IntCounter,

    /// Failed passes by class (`retryable` / `permanent`)
    pub reconcile_errors_total: IntCounterVec,

    /// Pass duration
    pub reconcile_duration_seconds: Histogram,

    /// Dead Man's Snitch API calls by operation and outcome
    pub dms_api_calls_total: IntCounterVec,

    /// Dead Man's Snitch API call duration by operation
    pub dms_api_call_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create and register all metrics
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let reconciliations_total = IntCounter::with_opts(Opts::new(
            "dms_reconciliations_total",
            "DeadmansSnitchIntegration reconciliation passes",
        ))?;
        registry.register(Box::new(reconciliations_total.clone()))?;

        let reconcile_errors_total = IntCounterVec::new(
            Opts::new("dms_reconcile_errors_total", "Failed reconciliation passes"),
            &["class"],
        )?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;

        let reconcile_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("dms_reconcile_duration_seconds", "Reconciliation pass duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        let dms_api_calls_total = IntCounterVec::new(
            Opts::new("dms_api_calls_total", "Dead Man's Snitch API calls"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(dms_api_calls_total.clone()))?;

        let dms_api_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new("dms_api_call_duration_seconds", "Dead Man's Snitch API call duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["operation"],
        )?;
        registry.register(Box::new(dms_api_call_duration_seconds.clone()))?;

        Ok(Self {
            reconciliations_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            dms_api_calls_total,
            dms_api_call_duration_seconds,
        })
    }

    /// Record one Dead Man's Snitch API call
    pub fn record_dms_call(&self, operation: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.dms_api_calls_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.dms_api_call_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record a failed reconciliation pass
    pub fn record_reconcile_error(&self, class: &str) {
        self.reconcile_errors_total.with_label_values(&[class]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_and_records() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();

        metrics.reconciliations_total.inc();
        metrics.record_reconcile_error("permanent");
        metrics.record_dms_call("create_snitch", true, 0.2);
        metrics.record_dms_call("create_snitch", false, 0.1);

        assert_eq!(metrics.reconcile_errors_total.with_label_values(&["permanent"]).get(), 1);
        assert_eq!(metrics.dms_api_calls_total.with_label_values(&["create_snitch", "success"]).get(), 1);
        assert_eq!(metrics.dms_api_calls_total.with_label_values(&["create_snitch", "error"]).get(), 1);

        let names: Vec<String> = registry.gather().iter().map(|f| f.name().to_string()).collect();
        assert!(names.contains(&"dms_reconciliations_total".to_string()));
        assert!(names.contains(&"dms_api_call_duration_seconds".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        Metrics::new(&registry).unwrap();
        assert!(Metrics::new(&registry).is_err());
    }
}
