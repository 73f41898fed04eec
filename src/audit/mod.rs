// * Key-Space Auditor
// * discover -> probe -> compute -> filter/sort; one pass per invocation, nothing cached

pub mod column;
pub mod discovery;
pub mod errors;
pub mod fill;
pub mod probe;
pub mod report;
pub mod source;

// * Re-exports for convenient access
pub use column::{ColumnSpec, IntegerWidth};
pub use discovery::{discover_columns, CatalogRow, PRIMARY_KEY_CATALOG_SQL};
pub use errors::{AuditError, AuditResult};
pub use fill::{fill_percentage, FillMeasurement};
pub use probe::ProbeQuery;
pub use report::{colour_for, composite_tables, MetricDescriptor, Report, SkippedProbe};
pub use source::{AsyncResult, CatalogSource, InMemoryCatalog, PgCatalogSource};

use crate::ops::telemetry;
use futures::StreamExt;
use std::time::Instant;

/// What happens when a single probe fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbePolicy {
    /// Abort the whole audit; no partial report
    #[default]
    Abort,
    /// Log the failure, leave the column out, keep going
    SkipAndLog,
}

/// Options for one audit pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOptions {
    /// Probes in flight at once over the single connection
    pub probe_concurrency: usize,
    pub policy: ProbePolicy,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            probe_concurrency: 1,
            policy: ProbePolicy::Abort,
        }
    }
}

/// Runs audit passes against a catalog source
#[derive(Debug)]
pub struct Auditor<S> {
    source: S,
    options: AuditOptions,
}

impl<S: CatalogSource> Auditor<S> {
    /// Creates an auditor with default options (sequential, abort on failure)
    pub fn new(source: S) -> Self {
        Self::with_options(source, AuditOptions::default())
    }

    pub fn with_options(source: S, options: AuditOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &AuditOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Performs one full audit pass.
    ///
    /// Probe results are consumed in discovery order even when several are in
    /// flight, so the report is identical for an unchanged database.
    pub async fn run(&self) -> AuditResult<Report> {
        let started = Instant::now();
        let columns = discover_columns(&self.source).await?;
        let discovered = columns.len();
        let composite = composite_tables(&columns);
        telemetry::set_columns_discovered(discovered);

        let source = &self.source;
        let mut probes = futures::stream::iter(columns)
            .map(move |spec| async move {
                let probe = ProbeQuery::for_column(&spec);
                let result = source.fetch_max(&probe).await;
                (spec, result)
            })
            .buffered(self.options.probe_concurrency.max(1));

        let mut measurements = Vec::with_capacity(discovered);
        let mut skipped = Vec::new();

        while let Some((spec, result)) = probes.next().await {
            match result {
                Ok(observed_max) => {
                    telemetry::record_probe("success");
                    tracing::debug!(
                        schema = spec.schema(),
                        table = spec.table(),
                        column = spec.column(),
                        observed_max,
                        "Probed column maximum"
                    );
                    measurements.push(FillMeasurement::compute(spec, observed_max)?);
                }
                Err(e) if self.options.policy == ProbePolicy::SkipAndLog => {
                    telemetry::record_probe("skipped");
                    tracing::warn!(
                        schema = spec.schema(),
                        table = spec.table(),
                        column = spec.column(),
                        error = %e,
                        "Probe failed, column skipped"
                    );
                    skipped.push(SkippedProbe {
                        label: spec.label(),
                        column: spec.column().to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    telemetry::record_probe("failure");
                    return Err(e);
                }
            }
        }

        let report = Report::from_measurements(measurements, discovered)
            .with_skipped(skipped)
            .with_composite_tables(composite);
        let elapsed = started.elapsed().as_secs_f64();
        telemetry::record_audit_duration(elapsed);
        telemetry::publish_report(&report);

        tracing::info!(
            discovered,
            reported = report.len(),
            skipped = report.skipped().len(),
            elapsed_secs = elapsed,
            "Audit complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_table("public", "stories", "stories_id", "bigint", 8, i64::MAX / 2)
            .with_table("public", "empty_tbl", "id", "integer", 4, 0)
            .with_table("public", "feeds", "feeds_id", "smallint", 2, 29_490)
            .with_table("archive", "downloads", "downloads_id", "integer", 4, 1_073_741_823)
    }

    #[tokio::test]
    async fn test_run_produces_sorted_filtered_report() {
        let auditor = Auditor::new(media_catalog());
        let report = auditor.run().await.unwrap();

        assert_eq!(report.discovered(), 4);
        assert_eq!(
            report.pairs(),
            vec![
                ("archive.downloads".to_string(), 50),
                ("public.feeds".to_string(), 90),
                ("public.stories".to_string(), 50),
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_by_default() {
        let catalog = media_catalog().fail_probe("public", "feeds", "feeds_id");
        let result = Auditor::new(catalog).run().await;
        assert!(matches!(result, Err(AuditError::Source(_))));
    }

    #[tokio::test]
    async fn test_probe_failure_skipped_when_relaxed() {
        let catalog = media_catalog().fail_probe("public", "feeds", "feeds_id");
        let options = AuditOptions {
            probe_concurrency: 1,
            policy: ProbePolicy::SkipAndLog,
        };
        let report = Auditor::with_options(catalog, options).run().await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.skipped().len(), 1);
        assert_eq!(report.skipped()[0].label, "public.feeds");
    }

    #[tokio::test]
    async fn test_concurrent_probes_match_sequential() {
        let sequential = Auditor::new(media_catalog()).run().await.unwrap();
        let options = AuditOptions {
            probe_concurrency: 8,
            ..Default::default()
        };
        let concurrent = Auditor::with_options(media_catalog(), options)
            .run()
            .await
            .unwrap();
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_zero_concurrency_treated_as_one() {
        let options = AuditOptions {
            probe_concurrency: 0,
            ..Default::default()
        };
        let report = Auditor::with_options(media_catalog(), options)
            .run()
            .await
            .unwrap();
        assert_eq!(report.len(), 3);
    }
}
