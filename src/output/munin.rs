// * Munin plugin protocol: `config` describes the graph, a bare run prints values

use crate::audit::report::MetricDescriptor;
use crate::config::constants::{MUNIN_GRAPH_CATEGORY, MUNIN_GRAPH_TITLE, MUNIN_GRAPH_VLABEL};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;

lazy_static! {
    static ref INVALID_FIELD_CHARS: Regex =
        Regex::new(r"[^A-Za-z0-9_]").expect("! CRITICAL: Failed to compile field name regex");
}

/// Sanitises a label into a Munin field name (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn field_name(label: &str) -> String {
    let mut name = INVALID_FIELD_CHARS.replace_all(label, "_").into_owned();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Assigns a unique field name to every descriptor, in order.
///
/// Members of a composite key always carry their column name, so a field keeps
/// its name whichever sibling columns are above 0% on a given run. Remaining
/// collisions (labels differing only in punctuation) get the column name
/// appended, then a counter.
pub fn field_names(descriptors: &[MetricDescriptor]) -> Vec<String> {
    let mut seen = HashSet::new();
    descriptors
        .iter()
        .map(|d| {
            let mut name = if d.composite_key {
                field_name(&format!("{}_{}", d.label, d.column))
            } else {
                field_name(&d.label)
            };
            if seen.contains(&name) {
                name = field_name(&format!("{}_{}", d.label, d.column));
            }
            let base = name.clone();
            let mut n = 2;
            while seen.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

/// Writes the `config` response
pub fn write_config<W: Write>(out: &mut W, descriptors: &[MetricDescriptor]) -> std::io::Result<()> {
    writeln!(out, "graph_title {}", MUNIN_GRAPH_TITLE)?;
    writeln!(out, "graph_vlabel {}", MUNIN_GRAPH_VLABEL)?;
    writeln!(out, "graph_category {}", MUNIN_GRAPH_CATEGORY)?;
    writeln!(out, "graph_args --base 1000 -l 0 --upper-limit 100")?;
    writeln!(
        out,
        "graph_info Highest stored value of each integer primary key as a share of its type's maximum"
    )?;

    for (d, field) in descriptors.iter().zip(field_names(descriptors)) {
        writeln!(out, "{}.label {}", field, d.label)?;
        writeln!(out, "{}.info {} ({})", field, d.column, d.type_name)?;
        writeln!(out, "{}.min 0", field)?;
        writeln!(out, "{}.warning {}", field, d.warning)?;
        writeln!(out, "{}.critical {}", field, d.critical)?;
        writeln!(out, "{}.colour {}", field, d.colour)?;
    }
    Ok(())
}

/// Writes the fetch response
pub fn write_values<W: Write>(out: &mut W, descriptors: &[MetricDescriptor]) -> std::io::Result<()> {
    for (d, field) in descriptors.iter().zip(field_names(descriptors)) {
        writeln!(out, "{}.value {}", field, d.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ColumnSpec, FillMeasurement, Report};
    use crate::ops::alerting::Thresholds;

    fn descriptors() -> Vec<MetricDescriptor> {
        let rows = [
            ("public", "stories", "stories_id", "bigint", 8, i64::MAX / 2),
            ("public", "feeds", "feeds_id", "smallint", 2, 29_490),
        ];
        let ms = rows.iter().map(|(s, t, c, ty, w, max)| {
            FillMeasurement::compute(ColumnSpec::new(*s, *t, *c, *ty, *w).unwrap(), *max).unwrap()
        });
        Report::from_measurements(ms, 2).descriptors(Thresholds::default())
    }

    #[test]
    fn test_field_name_sanitising() {
        assert_eq!(field_name("public.stories"), "public_stories");
        assert_eq!(field_name("Feed Items.x-y"), "Feed_Items_x_y");
        assert_eq!(field_name("2024.logs"), "_2024_logs");
        assert_eq!(field_name(""), "_");
    }

    #[test]
    fn test_field_names_unique() {
        let mut ds = descriptors();
        let mut twin = ds[0].clone();
        twin.column = "other_id".to_string();
        ds.push(twin.clone());
        ds.push(twin);

        let names = field_names(&ds);
        assert_eq!(
            names,
            vec![
                "public_feeds",
                "public_stories",
                "public_feeds_other_id",
                "public_feeds_other_id_2"
            ]
        );
    }

    fn links(from_max: i64, to_max: i64) -> Vec<MetricDescriptor> {
        let ms = [("from_id", from_max), ("to_id", to_max)].map(|(column, max)| {
            FillMeasurement::compute(
                ColumnSpec::new("public", "links", column, "smallint", 2).unwrap(),
                max,
            )
            .unwrap()
        });
        Report::from_measurements(ms, 2).descriptors(Thresholds::default())
    }

    #[test]
    fn test_composite_field_names_stable_across_runs() {
        // * Only the second member is above 0% on the first run
        let first = field_names(&links(0, 16_384));
        let second = field_names(&links(3_270, 16_384));

        assert_eq!(first, vec!["public_links_to_id"]);
        assert_eq!(second, vec!["public_links_from_id", "public_links_to_id"]);
    }

    #[test]
    fn test_values_output() {
        let mut out = Vec::new();
        write_values(&mut out, &descriptors()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "public_feeds.value 90\npublic_stories.value 50\n");
    }

    #[test]
    fn test_config_output() {
        let mut out = Vec::new();
        write_config(&mut out, &descriptors()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("graph_title "));
        assert!(text.contains("graph_category postgresql\n"));
        assert!(text.contains("public_feeds.label public.feeds\n"));
        assert!(text.contains("public_feeds.warning 85\n"));
        assert!(text.contains("public_feeds.critical 90\n"));
        assert!(text.contains("public_feeds.colour 00CC00\n"));
        assert!(text.contains("public_stories.colour 0066B3\n"));
    }

    #[test]
    fn test_empty_report_values() {
        let mut out = Vec::new();
        write_values(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }
}
