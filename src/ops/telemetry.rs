// * Telemetry - JSON Logging and Prometheus Metrics
// * Logs go to stderr; stdout belongs to the plugin output

use crate::audit::report::Report;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram, CounterVec,
    Encoder, Gauge, GaugeVec, Histogram, TextEncoder,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    // * Fill percentage per primary-key column
    pub static ref KEYSPACE_FILL_PERCENT: GaugeVec = register_gauge_vec!(
        "keyspace_fill_percent",
        "Primary key fill percentage (coarse, rounded down)",
        &["schema", "table", "column"]
    ).unwrap();

    // * Current maximum stored value
    pub static ref KEYSPACE_OBSERVED_MAX: GaugeVec = register_gauge_vec!(
        "keyspace_observed_max",
        "Current maximum value stored in the primary key column",
        &["schema", "table", "column"]
    ).unwrap();

    // * Type ceiling
    pub static ref KEYSPACE_MAX_REPRESENTABLE: GaugeVec = register_gauge_vec!(
        "keyspace_max_representable",
        "Largest value the primary key column type can hold",
        &["schema", "table", "column"]
    ).unwrap();

    // * Columns found by schema discovery
    pub static ref COLUMNS_DISCOVERED: Gauge = register_gauge!(
        "keyspace_columns_discovered",
        "Integer primary key columns found by the last audit"
    ).unwrap();

    // * Columns above 0% in the last report
    pub static ref COLUMNS_REPORTED: Gauge = register_gauge!(
        "keyspace_columns_reported",
        "Primary key columns included in the last report"
    ).unwrap();

    // * Probe outcomes
    pub static ref PROBES_TOTAL: CounterVec = register_counter_vec!(
        "keyspace_probes_total",
        "Maximum probes by outcome",
        &["status"]
    ).unwrap();

    // * Wall time of one audit pass
    pub static ref AUDIT_DURATION_SECONDS: Histogram = register_histogram!(
        "keyspace_audit_duration_seconds",
        "Audit pass duration in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();
}

/// Initializes the tracing subscriber with JSON formatting on stderr
///
/// # Example
/// ```ignore
/// use keyspace_audit::ops::telemetry;
///
/// telemetry::init_tracing();
/// tracing::info!(table = "public.stories", "Probing");
/// ```
pub fn init_tracing() {
    init_tracing_with_level("warn");
}

/// Initializes JSON tracing with a fallback level when `RUST_LOG` is unset
pub fn init_tracing_with_level(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .try_init();
}

/// Initializes tracing with pretty formatting (for interactive use)
pub fn init_tracing_pretty(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty().with_writer(std::io::stderr))
        .try_init();
}

/// Returns the current metrics in Prometheus text exposition format
pub fn get_metrics_string() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Records a probe outcome (`success`, `failure`, `skipped`)
pub fn record_probe(status: &str) {
    PROBES_TOTAL.with_label_values(&[status]).inc();
}

/// Updates the discovered column count
pub fn set_columns_discovered(count: usize) {
    COLUMNS_DISCOVERED.set(count as f64);
}

/// Records audit duration
pub fn record_audit_duration(seconds: f64) {
    AUDIT_DURATION_SECONDS.observe(seconds);
}

/// Replaces the per-column gauges with the contents of a report
pub fn publish_report(report: &Report) {
    write_report_gauges(
        report,
        &KEYSPACE_FILL_PERCENT,
        &KEYSPACE_OBSERVED_MAX,
        &KEYSPACE_MAX_REPRESENTABLE,
    );
    COLUMNS_REPORTED.set(report.len() as f64);
}

/// Resets the three per-column gauge families, then sets one series per
/// reported column. Columns absent from `report` leave no stale series.
pub fn write_report_gauges(
    report: &Report,
    fill: &GaugeVec,
    observed_max: &GaugeVec,
    max_representable: &GaugeVec,
) {
    fill.reset();
    observed_max.reset();
    max_representable.reset();

    for m in report.measurements() {
        let labels = [m.column.schema(), m.column.table(), m.column.column()];
        fill.with_label_values(&labels).set(m.percentage as f64);
        observed_max
            .with_label_values(&labels)
            .set(m.observed_max as f64);
        max_representable
            .with_label_values(&labels)
            .set(m.column.max_representable() as f64);
    }
}
