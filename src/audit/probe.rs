// * Live Maximum Prober
// * Identifiers cannot be bound as parameters, so every probe statement is built here and only here.

use crate::audit::column::ColumnSpec;

/// Quotes a catalog identifier for interpolation into SQL text.
///
/// Wraps in double quotes and doubles embedded quotes, which is the complete
/// quoting rule for PostgreSQL identifiers. Callers only pass names taken from
/// a validated [`ColumnSpec`].
pub(crate) fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// A probe statement for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeQuery {
    spec: ColumnSpec,
    sql: String,
}

impl ProbeQuery {
    /// Builds the `MAX()` statement for a discovered column.
    ///
    /// The result is cast to `bigint` so every width decodes as `i64`, and an
    /// empty table yields 0 instead of NULL.
    pub fn for_column(spec: &ColumnSpec) -> Self {
        let sql = format!(
            "SELECT COALESCE(MAX({column}), 0)::bigint FROM {schema}.{table}",
            column = quote_ident(spec.column()),
            schema = quote_ident(spec.schema()),
            table = quote_ident(spec.table()),
        );
        Self {
            spec: spec.clone(),
            sql,
        }
    }

    pub fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}
