// * Alerting - warning/critical classification of key-space fill
// * Thresholds are static; nothing here is computed from history

use crate::audit::report::MetricDescriptor;
use crate::config::constants::{DEFAULT_CRITICAL_PERCENT, DEFAULT_WARNING_PERCENT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Static warning and critical thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Thresholds {
    pub warning: i64,
    pub critical: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_PERCENT,
            critical: DEFAULT_CRITICAL_PERCENT,
        }
    }
}

impl Thresholds {
    pub fn new(warning: i64, critical: i64) -> Self {
        Self { warning, critical }
    }

    /// Classifies a fill percentage; both bounds are inclusive
    pub fn classify(&self, percentage: i64) -> FillStatus {
        if percentage >= self.critical {
            FillStatus::Critical
        } else if percentage >= self.warning {
            FillStatus::Warning
        } else {
            FillStatus::Ok
        }
    }
}

/// Fill classification for one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Ok,
    Warning,
    Critical,
}

impl std::fmt::Display for FillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillStatus::Ok => write!(f, "OK"),
            FillStatus::Warning => write!(f, "WARNING"),
            FillStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSeverity {
    /// Key space nearly exhausted, inserts will start failing
    Critical,
    /// Key space filling up, plan a type migration
    Warning,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Critical => write!(f, "CRITICAL"),
            AlertSeverity::Warning => write!(f, "WARNING"),
        }
    }
}

/// An alert event
#[derive(Debug, Clone)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub label: String,
    pub message: String,
    pub context: HashMap<String, String>,
    pub id: u64,
}

impl Alert {
    /// Creates a new alert
    pub fn new(severity: AlertSeverity, label: impl Into<String>, message: impl Into<String>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            severity,
            label: label.into(),
            message: message.into(),
            context: HashMap::new(),
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Adds context to the alert
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Builds an alert from a descriptor, or `None` when it is within thresholds
    pub fn from_descriptor(descriptor: &MetricDescriptor) -> Option<Self> {
        let (severity, threshold) = match descriptor.status {
            FillStatus::Ok => return None,
            FillStatus::Warning => (AlertSeverity::Warning, descriptor.warning),
            FillStatus::Critical => (AlertSeverity::Critical, descriptor.critical),
        };

        let alert = Alert::new(
            severity,
            descriptor.label.clone(),
            format!(
                "Primary key {}.{} is {}% full (threshold {}%)",
                descriptor.label, descriptor.column, descriptor.value, threshold
            ),
        )
        .with_context("column", descriptor.column.clone())
        .with_context("type", descriptor.type_name.clone())
        .with_context("observed_max", descriptor.observed_max.to_string())
        .with_context("max_representable", descriptor.max_representable.to_string());

        Some(alert)
    }

    /// Logs the alert using tracing
    pub fn log(&self) {
        let mut pairs: Vec<_> = self.context.iter().collect();
        pairs.sort();
        let context_str = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");

        match self.severity {
            AlertSeverity::Critical => {
                tracing::error!(
                    alert_id = self.id,
                    severity = %self.severity,
                    label = %self.label,
                    context = context_str,
                    "ALERT: {}", self.message
                );
            }
            AlertSeverity::Warning => {
                tracing::warn!(
                    alert_id = self.id,
                    severity = %self.severity,
                    label = %self.label,
                    context = context_str,
                    "ALERT: {}", self.message
                );
            }
        }
    }
}

/// Trait for alert handlers
pub trait AlertHandler: Send + Sync {
    /// Handles an alert
    fn handle(&self, alert: &Alert);
}

/// Default logging handler
#[derive(Debug, Default)]
pub struct LoggingHandler;

impl AlertHandler for LoggingHandler {
    fn handle(&self, alert: &Alert) {
        alert.log();
    }
}

/// Collects every dispatched alert; useful for tests and summaries
#[derive(Debug, Default)]
pub struct CollectingHandler {
    alerts: RwLock<Vec<Alert>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().map(|a| a.clone()).unwrap_or_default()
    }
}

impl AlertHandler for CollectingHandler {
    fn handle(&self, alert: &Alert) {
        if let Ok(mut alerts) = self.alerts.write() {
            alerts.push(alert.clone());
        }
    }
}

/// Turns report descriptors into alerts and dispatches them
pub struct AlertManager {
    handlers: Vec<Arc<dyn AlertHandler>>,
}

impl std::fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManager")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

impl AlertManager {
    /// Creates a manager with the logging handler installed
    pub fn new() -> Self {
        Self {
            handlers: vec![Arc::new(LoggingHandler)],
        }
    }

    /// Creates a manager with no handlers
    pub fn silent() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Adds an alert handler
    pub fn add_handler(&mut self, handler: Arc<dyn AlertHandler>) {
        self.handlers.push(handler);
    }

    /// Fires an alert to every handler
    pub fn fire_alert(&self, alert: &Alert) {
        for handler in &self.handlers {
            handler.handle(alert);
        }
    }

    /// Fires one alert per descriptor outside its thresholds and returns them
    pub fn evaluate(&self, descriptors: &[MetricDescriptor]) -> Vec<Alert> {
        let alerts: Vec<Alert> = descriptors.iter().filter_map(Alert::from_descriptor).collect();
        for alert in &alerts {
            self.fire_alert(alert);
        }
        alerts
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::report::Report;
    use crate::audit::{ColumnSpec, FillMeasurement};

    fn descriptors(values: &[(&str, &str, i64, i64)]) -> Vec<MetricDescriptor> {
        let measurements = values.iter().map(|(table, type_name, width, max)| {
            let spec = ColumnSpec::new("public", *table, "id", *type_name, *width as i16).unwrap();
            FillMeasurement::compute(spec, *max).unwrap()
        });
        Report::from_measurements(measurements, 0).descriptors(Thresholds::default())
    }

    #[test]
    fn test_classify_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.classify(0), FillStatus::Ok);
        assert_eq!(t.classify(84), FillStatus::Ok);
        assert_eq!(t.classify(85), FillStatus::Warning);
        assert_eq!(t.classify(89), FillStatus::Warning);
        assert_eq!(t.classify(90), FillStatus::Critical);
        assert_eq!(t.classify(100), FillStatus::Critical);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", FillStatus::Ok), "OK");
        assert_eq!(format!("{}", FillStatus::Warning), "WARNING");
        assert_eq!(format!("{}", FillStatus::Critical), "CRITICAL");
        assert_eq!(format!("{}", AlertSeverity::Critical), "CRITICAL");
    }

    #[test]
    fn test_alert_with_context() {
        let alert = Alert::new(AlertSeverity::Warning, "public.stories", "filling")
            .with_context("column", "stories_id");
        assert_eq!(alert.context.get("column"), Some(&"stories_id".to_string()));
    }

    #[test]
    fn test_evaluate_fires_only_outside_thresholds() {
        let collector = Arc::new(CollectingHandler::new());
        let mut manager = AlertManager::silent();
        manager.add_handler(collector.clone());

        let ds = descriptors(&[
            ("calm", "integer", 4, 1_000_000),
            ("busy", "smallint", 2, 28_000),
            ("full", "smallint", 2, 29_490),
        ]);
        let alerts = manager.evaluate(&ds);

        assert_eq!(alerts.len(), 2);
        let collected = collector.alerts();
        assert_eq!(collected.len(), 2);
        let busy = collected.iter().find(|a| a.label == "public.busy").unwrap();
        assert_eq!(busy.severity, AlertSeverity::Warning);
        let full = collected.iter().find(|a| a.label == "public.full").unwrap();
        assert_eq!(full.severity, AlertSeverity::Critical);
        assert!(full.message.contains("90%"));
    }

    #[test]
    fn test_logging_handler_does_not_panic() {
        let manager = AlertManager::new();
        let ds = descriptors(&[("full", "smallint", 2, 32_767)]);
        assert_eq!(manager.evaluate(&ds).len(), 1);
    }
}
