// * Operations: alert classification and telemetry
// * Provides structured logging, Prometheus gauges, and threshold alerting for audit results

pub mod alerting;
pub mod telemetry;

// * Re-exports for convenient access
pub use alerting::{
    Alert, AlertHandler, AlertManager, AlertSeverity, CollectingHandler, FillStatus,
    LoggingHandler, Thresholds,
};
pub use telemetry::{
    get_metrics_string, init_tracing, init_tracing_pretty, init_tracing_with_level,
    publish_report, record_audit_duration, record_probe, set_columns_discovered,
    write_report_gauges,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        assert_eq!(Thresholds::default(), Thresholds::new(85, 90));
        assert_eq!(Thresholds::default().classify(85), FillStatus::Warning);
        assert!(format!("{:?}", AlertManager::new()).contains("handler_count: 1"));
        assert!(format!("{:?}", AlertManager::silent()).contains("handler_count: 0"));
        assert!(CollectingHandler::new().alerts().is_empty());
    }

    #[test]
    fn test_telemetry_metrics() {
        set_columns_discovered(5);
        record_probe("success");

        let metrics = get_metrics_string();
        assert!(metrics.contains("# TYPE keyspace_columns_discovered gauge"));
        assert!(metrics.contains("keyspace_probes_total{status=\"success\"}"));
    }
}
