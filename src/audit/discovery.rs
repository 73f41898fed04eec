// * Schema Discoverer
// * Enumerates every live primary-key column restricted to fixed-width integer types

use crate::audit::column::{ColumnSpec, IntegerWidth};
use crate::audit::errors::{AuditError, AuditResult};
use crate::audit::source::CatalogSource;

// * Namespace PostgreSQL uses for out-of-line storage of oversized values
pub const TOAST_NAMESPACE: &str = "pg_toast";

// * System catalogs; several (pg_statistic, pg_largeobject) are superuser-only
pub const CATALOG_NAMESPACE: &str = "pg_catalog";

// * SQL-standard information schema views and their backing tables
pub const INFORMATION_SCHEMA_NAMESPACE: &str = "information_schema";

// * Per-backend toast namespaces for temporary relations (pg_toast_temp_N)
pub const TEMP_TOAST_NAMESPACE_PREFIX: &str = "pg_toast_temp_";

// * Per-backend namespaces holding temporary relations (pg_temp_N)
pub const TEMP_NAMESPACE_PREFIX: &str = "pg_temp_";

/// True for namespaces owned by the server rather than by applications
pub fn is_system_namespace(name: &str) -> bool {
    name == TOAST_NAMESPACE
        || name == CATALOG_NAMESPACE
        || name == INFORMATION_SCHEMA_NAMESPACE
        || name.starts_with(TEMP_TOAST_NAMESPACE_PREFIX)
        || name.starts_with(TEMP_NAMESPACE_PREFIX)
}

// * `pg_class.relpersistence` value for temporary relations
pub const TEMPORARY_PERSISTENCE: &str = "t";

/// Catalog scan for primary-key columns.
///
/// Filters server-side with the same rules [`CatalogRow::is_candidate`] applies
/// client-side. Runs inside a read-only session; creates no schema objects.
pub const PRIMARY_KEY_CATALOG_SQL: &str = r#"
SELECT n.nspname::text                        AS schema_name,
       c.relname::text                        AS table_name,
       a.attname::text                        AS column_name,
       pg_catalog.format_type(a.atttypid, a.atttypmod) AS type_name,
       t.typlen                               AS storage_width,
       i.indisprimary                         AS is_primary,
       a.attisdropped                         AS is_dropped,
       c.relpersistence::text                 AS persistence
  FROM pg_catalog.pg_index i
  JOIN pg_catalog.pg_class c      ON c.oid = i.indrelid
  JOIN pg_catalog.pg_namespace n  ON n.oid = c.relnamespace
  JOIN pg_catalog.pg_attribute a  ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey)
  JOIN pg_catalog.pg_type t       ON t.oid = a.atttypid
 WHERE i.indisprimary
   AND NOT a.attisdropped
   AND c.relpersistence <> 't'
   AND n.nspname NOT IN ('pg_toast', 'pg_catalog', 'information_schema')
   AND n.nspname NOT LIKE 'pg\_toast\_temp\_%'
   AND n.nspname NOT LIKE 'pg\_temp\_%'
   AND pg_catalog.format_type(a.atttypid, a.atttypmod) IN ('smallint', 'integer', 'bigint')
 ORDER BY n.nspname, c.relname, a.attnum
"#;

/// One raw row of index/attribute metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub type_name: String,
    pub storage_width: i16,
    pub is_primary: bool,
    pub is_dropped: bool,
    pub persistence: String,
}

impl CatalogRow {
    /// A live, permanent, primary-key integer column
    pub fn primary_key(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        type_name: impl Into<String>,
        storage_width: i16,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            type_name: type_name.into(),
            storage_width,
            is_primary: true,
            is_dropped: false,
            persistence: "p".to_string(),
        }
    }

    pub fn temporary(mut self) -> Self {
        self.persistence = TEMPORARY_PERSISTENCE.to_string();
        self
    }

    pub fn dropped(mut self) -> Self {
        self.is_dropped = true;
        self
    }

    pub fn non_primary(mut self) -> Self {
        self.is_primary = false;
        self
    }

    /// Every inclusion rule must hold for the column to be audited
    pub fn is_candidate(&self) -> bool {
        self.is_primary
            && !self.is_dropped
            && self.persistence != TEMPORARY_PERSISTENCE
            && !is_system_namespace(&self.schema)
            && IntegerWidth::from_type_name(&self.type_name).is_some()
    }

    /// Decodes a row of [`PRIMARY_KEY_CATALOG_SQL`]
    pub(crate) fn from_row(row: &tokio_postgres::Row) -> AuditResult<Self> {
        Ok(Self {
            schema: row.try_get("schema_name").map_err(AuditError::metadata)?,
            table: row.try_get("table_name").map_err(AuditError::metadata)?,
            column: row.try_get("column_name").map_err(AuditError::metadata)?,
            type_name: row.try_get("type_name").map_err(AuditError::metadata)?,
            storage_width: row.try_get("storage_width").map_err(AuditError::metadata)?,
            is_primary: row.try_get("is_primary").map_err(AuditError::metadata)?,
            is_dropped: row.try_get("is_dropped").map_err(AuditError::metadata)?,
            persistence: row.try_get("persistence").map_err(AuditError::metadata)?,
        })
    }
}

/// Discovers every auditable primary-key column.
///
/// Fails as a whole: a metadata error or a candidate row that does not validate
/// aborts discovery with no partial snapshot.
pub async fn discover_columns<S>(source: &S) -> AuditResult<Vec<ColumnSpec>>
where
    S: CatalogSource + ?Sized,
{
    let rows = source.fetch_catalog().await?;
    let total = rows.len();

    let columns = rows
        .into_iter()
        .filter(CatalogRow::is_candidate)
        .map(|row| {
            ColumnSpec::new(
                row.schema,
                row.table,
                row.column,
                row.type_name,
                row.storage_width,
            )
        })
        .collect::<AuditResult<Vec<_>>>()?;

    for spec in &columns {
        tracing::debug!(
            schema = spec.schema(),
            table = spec.table(),
            column = spec.column(),
            width = %spec.width(),
            "Discovered primary key column"
        );
    }
    tracing::info!(
        catalog_rows = total,
        candidates = columns.len(),
        "Schema discovery complete"
    );

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::source::InMemoryCatalog;

    #[test]
    fn test_candidate_rules() {
        let base = CatalogRow::primary_key("public", "stories", "stories_id", "bigint", 8);
        assert!(base.is_candidate());
        assert!(!base.clone().temporary().is_candidate());
        assert!(!base.clone().dropped().is_candidate());
        assert!(!base.clone().non_primary().is_candidate());

        let toast = CatalogRow::primary_key(TOAST_NAMESPACE, "pg_toast_1", "chunk_id", "integer", 4);
        assert!(!toast.is_candidate());
    }

    #[test]
    fn test_type_filter() {
        for type_name in ["numeric", "text", "uuid", "character varying(20)"] {
            let row = CatalogRow::primary_key("public", "t", "id", type_name, -1);
            assert!(!row.is_candidate(), "{} must be excluded", type_name);
        }
    }

    #[test]
    fn test_catalog_sql_filters() {
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("i.indisprimary"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("NOT a.attisdropped"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("relpersistence <> 't'"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("'pg_toast'"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("'pg_catalog'"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("'information_schema'"));
        assert!(PRIMARY_KEY_CATALOG_SQL.contains("pg\\_toast\\_temp\\_%"));
    }

    #[test]
    fn test_system_namespaces() {
        for schema in [
            "pg_catalog",
            "information_schema",
            "pg_toast",
            "pg_toast_temp_3",
            "pg_temp_3",
        ] {
            assert!(is_system_namespace(schema), "{} is a system namespace", schema);
        }
        for schema in ["public", "archive", "pg_tempdata", "catalog"] {
            assert!(!is_system_namespace(schema), "{} is an application namespace", schema);
        }
    }

    #[tokio::test]
    async fn test_discover_skips_system_catalog_keys() {
        // * Since PostgreSQL 14 the system catalogs carry integer primary keys
        let catalog = InMemoryCatalog::new()
            .with_row(CatalogRow::primary_key("pg_catalog", "pg_largeobject", "pageno", "integer", 4))
            .with_row(CatalogRow::primary_key("pg_catalog", "pg_statistic", "staattnum", "smallint", 2))
            .with_row(CatalogRow::primary_key("pg_catalog", "pg_attribute", "attnum", "smallint", 2))
            .with_row(CatalogRow::primary_key("information_schema", "sql_parts", "id", "integer", 4))
            .with_row(CatalogRow::primary_key("pg_toast_temp_7", "pg_toast_1", "chunk_id", "integer", 4))
            .with_row(CatalogRow::primary_key("public", "stories", "stories_id", "bigint", 8));

        let columns = discover_columns(&catalog).await.unwrap();
        let labels: Vec<_> = columns.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["public.stories"]);
    }

    #[tokio::test]
    async fn test_discover_skips_non_candidates() {
        let catalog = InMemoryCatalog::new()
            .with_row(CatalogRow::primary_key("public", "stories", "stories_id", "bigint", 8))
            .with_row(CatalogRow::primary_key("public", "scratch", "id", "bigint", 8).temporary())
            .with_row(CatalogRow::primary_key("public", "tags", "tag", "text", -1))
            .with_row(CatalogRow::primary_key("public", "media", "media_id", "integer", 4));

        let columns = discover_columns(&catalog).await.unwrap();
        let labels: Vec<_> = columns.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["public.stories", "public.media"]);
    }

    #[tokio::test]
    async fn test_discover_rejects_corrupt_width() {
        let catalog = InMemoryCatalog::new()
            .with_row(CatalogRow::primary_key("public", "stories", "stories_id", "bigint", 3));

        let result = discover_columns(&catalog).await;
        assert!(matches!(result, Err(AuditError::InvalidColumn { .. })));
    }

    #[tokio::test]
    async fn test_discover_propagates_catalog_failure() {
        let catalog = InMemoryCatalog::new().fail_catalog("permission denied for pg_index");
        assert!(discover_columns(&catalog).await.is_err());
    }
}
