// * Fill Calculator
// * Two-step integer arithmetic, kept bit-for-bit compatible with historical alert thresholds

use crate::audit::column::ColumnSpec;
use crate::audit::errors::{AuditError, AuditResult};
use serde::Serialize;

/// Computes `floor(observed_max / floor(max_representable / 100))`.
///
/// The denominator is floored first, so the result leans slightly high compared
/// to a precise ratio. Negative observations count as 0.
///
/// # Errors
/// [`AuditError::DegenerateThreshold`] when `max_representable / 100` floors to 0.
pub fn fill_percentage(observed_max: i64, max_representable: i64) -> AuditResult<i64> {
    let denominator = max_representable / 100;
    if denominator <= 0 {
        return Err(AuditError::DegenerateThreshold { max_representable });
    }
    Ok(observed_max.max(0) / denominator)
}

/// The live state of one column at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillMeasurement {
    pub column: ColumnSpec,
    pub observed_max: i64,
    pub percentage: i64,
}

impl FillMeasurement {
    /// Combines a column and its probed maximum
    pub fn compute(column: ColumnSpec, observed_max: i64) -> AuditResult<Self> {
        let observed_max = observed_max.max(0);
        let percentage = fill_percentage(observed_max, column.max_representable())?;
        Ok(Self {
            column,
            observed_max,
            percentage,
        })
    }

    /// Values left before the key space is exhausted
    pub fn headroom(&self) -> i64 {
        self.column.max_representable() - self.observed_max
    }
}
