// * Reporter
// * Filters, sorts, and shapes measurements into metric descriptors

use crate::audit::column::ColumnSpec;
use crate::audit::fill::FillMeasurement;
use crate::ops::alerting::{FillStatus, Thresholds};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// * Munin's default series palette, in its own order
const PALETTE: [&str; 28] = [
    "00CC00", "0066B3", "FF8000", "FFCC00", "330099", "990099", "CCFF00", "FF0000", "808080",
    "008F00", "00487D", "B35A00", "B38F00", "6B006B", "8FB300", "B30000", "BEBEBE", "80FF80",
    "80C9FF", "FFC080", "FFE680", "AA80FF", "EE00CC", "FF8080", "666600", "FFBFFF", "00FFCC",
    "CC6699",
];

/// Stable series colour for the n-th metric
pub fn colour_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// A probe that failed and was skipped under the relaxed policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProbe {
    pub label: String,
    pub column: String,
    pub reason: String,
}

/// Ordered, filtered audit result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    measurements: Vec<FillMeasurement>,
    discovered: usize,
    skipped: Vec<SkippedProbe>,
    // * `schema.table` labels whose primary key spans several integer columns
    composite_tables: BTreeSet<String>,
}

/// Labels of tables with more than one column in `columns`
pub fn composite_tables<'a, I>(columns: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a ColumnSpec>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for spec in columns {
        *counts.entry(spec.label()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(label, _)| label)
        .collect()
}

impl Report {
    /// Keeps measurements above 0% and sorts by schema, then table.
    ///
    /// Column name breaks ties between members of a composite key.
    pub fn from_measurements<I>(measurements: I, discovered: usize) -> Self
    where
        I: IntoIterator<Item = FillMeasurement>,
    {
        let all: Vec<FillMeasurement> = measurements.into_iter().collect();
        // * Counted before filtering, so an idle sibling column still marks the table
        let composite = composite_tables(all.iter().map(|m| &m.column));
        let mut measurements: Vec<FillMeasurement> =
            all.into_iter().filter(|m| m.percentage > 0).collect();
        measurements.sort_by(|a, b| a.column.sort_key().cmp(&b.column.sort_key()));

        Self {
            measurements,
            discovered,
            skipped: Vec::new(),
            composite_tables: composite,
        }
    }

    /// Marks tables whose key spans several discovered columns, even when some
    /// of those columns were skipped and never measured
    pub fn with_composite_tables(mut self, labels: BTreeSet<String>) -> Self {
        self.composite_tables.extend(labels);
        self
    }

    pub fn is_composite(&self, label: &str) -> bool {
        self.composite_tables.contains(label)
    }

    pub fn with_skipped(mut self, skipped: Vec<SkippedProbe>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn measurements(&self) -> &[FillMeasurement] {
        &self.measurements
    }

    /// Number of columns discovered before filtering
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn skipped(&self) -> &[SkippedProbe] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// `(schema.table, percentage)` pairs in report order
    pub fn pairs(&self) -> Vec<(String, i64)> {
        self.measurements
            .iter()
            .map(|m| (m.column.label(), m.percentage))
            .collect()
    }

    /// Monitoring descriptors carrying the given static thresholds
    pub fn descriptors(&self, thresholds: Thresholds) -> Vec<MetricDescriptor> {
        self.measurements
            .iter()
            .enumerate()
            .map(|(index, m)| MetricDescriptor {
                label: m.column.label(),
                schema: m.column.schema().to_string(),
                table: m.column.table().to_string(),
                column: m.column.column().to_string(),
                type_name: m.column.type_name().to_string(),
                value: m.percentage,
                observed_max: m.observed_max,
                max_representable: m.column.max_representable(),
                warning: thresholds.warning,
                critical: thresholds.critical,
                status: thresholds.classify(m.percentage),
                colour: colour_for(index),
                composite_key: self.is_composite(&m.column.label()),
            })
            .collect()
    }
}

/// One labelled gauge with static thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub label: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    pub type_name: String,
    pub value: i64,
    pub observed_max: i64,
    pub max_representable: i64,
    pub warning: i64,
    pub critical: i64,
    pub status: FillStatus,
    pub colour: &'static str,
    /// Another integer column shares this table's primary key
    pub composite_key: bool,
}
