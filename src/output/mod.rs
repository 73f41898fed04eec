// * Report rendering for each supported output format

pub mod munin;

use crate::audit::report::{MetricDescriptor, Report};
use crate::config::OutputFormat;
use crate::ops::telemetry;
use std::io::Write;

/// Writes the report in the requested format
pub fn render<W: Write>(
    out: &mut W,
    format: OutputFormat,
    report: &Report,
    descriptors: &[MetricDescriptor],
) -> std::io::Result<()> {
    match format {
        OutputFormat::Munin => munin::write_values(out, descriptors),
        OutputFormat::Table => write_table(out, report, descriptors),
        OutputFormat::Json => write_json(out, descriptors),
        OutputFormat::Prometheus => {
            // * Gauges were populated when the audit finished
            out.write_all(telemetry::get_metrics_string().as_bytes())
        }
    }
}

/// Aligned table for terminals
pub fn write_table<W: Write>(
    out: &mut W,
    report: &Report,
    descriptors: &[MetricDescriptor],
) -> std::io::Result<()> {
    let label_width = descriptors
        .iter()
        .map(|d| d.label.len())
        .chain(std::iter::once("TABLE".len()))
        .max()
        .unwrap_or(5);
    let column_width = descriptors
        .iter()
        .map(|d| d.column.len())
        .chain(std::iter::once("COLUMN".len()))
        .max()
        .unwrap_or(6);

    writeln!(
        out,
        "{:<lw$}  {:<cw$}  {:<8}  {:>19}  {:>4}  STATUS",
        "TABLE",
        "COLUMN",
        "TYPE",
        "MAX",
        "PCT",
        lw = label_width,
        cw = column_width
    )?;
    for d in descriptors {
        writeln!(
            out,
            "{:<lw$}  {:<cw$}  {:<8}  {:>19}  {:>3}%  {}",
            d.label,
            d.column,
            d.type_name,
            d.observed_max,
            d.value,
            d.status,
            lw = label_width,
            cw = column_width
        )?;
    }
    writeln!(
        out,
        "{} of {} primary key columns above 0%",
        report.len(),
        report.discovered()
    )?;
    for skipped in report.skipped() {
        writeln!(
            out,
            "skipped {}.{}: {}",
            skipped.label, skipped.column, skipped.reason
        )?;
    }
    Ok(())
}

/// Pretty JSON array of descriptors
pub fn write_json<W: Write>(out: &mut W, descriptors: &[MetricDescriptor]) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, descriptors)?;
    writeln!(out)
}
