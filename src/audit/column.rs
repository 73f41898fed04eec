// * Fixed-width integer primary-key columns and their representable bounds

use crate::audit::errors::{AuditError, AuditResult};
use serde::Serialize;

/// Storage width of a fixed-width signed integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerWidth {
    /// 2 bytes, `smallint`
    Small,
    /// 4 bytes, `integer`
    Regular,
    /// 8 bytes, `bigint`
    Big,
}

impl IntegerWidth {
    /// Resolves a catalog storage width in bytes
    pub fn from_bytes(bytes: i16) -> Option<Self> {
        match bytes {
            2 => Some(IntegerWidth::Small),
            4 => Some(IntegerWidth::Regular),
            8 => Some(IntegerWidth::Big),
            _ => None,
        }
    }

    /// Resolves a `format_type()` name
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "smallint" => Some(IntegerWidth::Small),
            "integer" => Some(IntegerWidth::Regular),
            "bigint" => Some(IntegerWidth::Big),
            _ => None,
        }
    }

    pub fn bytes(self) -> i16 {
        match self {
            IntegerWidth::Small => 2,
            IntegerWidth::Regular => 4,
            IntegerWidth::Big => 8,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            IntegerWidth::Small => "smallint",
            IntegerWidth::Regular => "integer",
            IntegerWidth::Big => "bigint",
        }
    }

    /// Exact signed upper bound for this width.
    ///
    /// A lookup, never `2^(8w-1) - 1` through floats: `f64` cannot hold
    /// `i64::MAX` exactly.
    pub const fn max_representable(self) -> i64 {
        match self {
            IntegerWidth::Small => i16::MAX as i64,
            IntegerWidth::Regular => i32::MAX as i64,
            IntegerWidth::Big => i64::MAX,
        }
    }
}

impl std::fmt::Display for IntegerWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One fixed-width integer primary-key column found in the schema.
///
/// Only constructible through [`ColumnSpec::new`], which rejects any type name
/// or width outside the supported set, so every instance is a safe probe target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnSpec {
    schema: String,
    table: String,
    column: String,
    type_name: String,
    width: IntegerWidth,
}

impl ColumnSpec {
    /// Validates a catalog row into a column spec.
    ///
    /// The declared type name must be one of `smallint`, `integer`, `bigint`,
    /// and the storage width must agree with it.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        type_name: impl Into<String>,
        width_bytes: i16,
    ) -> AuditResult<Self> {
        let schema = schema.into();
        let table = table.into();
        let column = column.into();
        let type_name = type_name.into();

        let invalid = |reason: String| AuditError::InvalidColumn {
            schema: schema.clone(),
            table: table.clone(),
            column: column.clone(),
            reason,
        };

        for (kind, name) in [("schema", &schema), ("table", &table), ("column", &column)] {
            if name.is_empty() || name.contains('\0') {
                return Err(invalid(format!("{} name is not a valid identifier", kind)));
            }
        }

        let declared = IntegerWidth::from_type_name(&type_name)
            .ok_or_else(|| invalid(format!("type {} is not a fixed-width integer", type_name)))?;
        let stored = IntegerWidth::from_bytes(width_bytes)
            .ok_or_else(|| invalid(format!("storage width {} is not 2, 4 or 8", width_bytes)))?;
        if declared != stored {
            return Err(invalid(format!(
                "type {} disagrees with storage width {}",
                type_name, width_bytes
            )));
        }

        Ok(Self {
            schema,
            table,
            column,
            type_name,
            width: declared,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn width(&self) -> IntegerWidth {
        self.width
    }

    pub fn max_representable(&self) -> i64 {
        self.width.max_representable()
    }

    /// Display label `schema.table`
    pub fn label(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Ordering key used by the reporter
    pub(crate) fn sort_key(&self) -> (&str, &str, &str) {
        (&self.schema, &self.table, &self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_bounds() {
        assert_eq!(IntegerWidth::Small.max_representable(), 32767);
        assert_eq!(IntegerWidth::Regular.max_representable(), 2147483647);
        assert_eq!(IntegerWidth::Big.max_representable(), 9223372036854775807);
    }

    #[test]
    fn test_width_lookup() {
        for bytes in [2, 4, 8] {
            let width = IntegerWidth::from_bytes(bytes).unwrap();
            assert_eq!(width.bytes(), bytes);
            assert_eq!(IntegerWidth::from_type_name(width.type_name()), Some(width));
        }
        assert_eq!(IntegerWidth::from_bytes(1), None);
        assert_eq!(IntegerWidth::from_bytes(16), None);
        assert_eq!(IntegerWidth::from_bytes(-1), None);
    }

    #[test]
    fn test_column_spec_accepts_supported_types() {
        let spec = ColumnSpec::new("public", "stories", "stories_id", "bigint", 8).unwrap();
        assert_eq!(spec.width(), IntegerWidth::Big);
        assert_eq!(spec.max_representable(), i64::MAX);
        assert_eq!(spec.label(), "public.stories");
    }

    #[test]
    fn test_column_spec_rejects_other_types() {
        for type_name in ["numeric", "text", "uuid", "int4"] {
            let result = ColumnSpec::new("public", "t", "id", type_name, 4);
            assert!(
                matches!(result, Err(AuditError::InvalidColumn { .. })),
                "{} should be rejected",
                type_name
            );
        }
    }

    #[test]
    fn test_column_spec_rejects_width_mismatch() {
        let result = ColumnSpec::new("public", "t", "id", "integer", 8);
        assert!(matches!(result, Err(AuditError::InvalidColumn { .. })));
    }

    #[test]
    fn test_column_spec_rejects_empty_identifier() {
        assert!(ColumnSpec::new("", "t", "id", "integer", 4).is_err());
        assert!(ColumnSpec::new("public", "t", "i\0d", "integer", 4).is_err());
    }
}
