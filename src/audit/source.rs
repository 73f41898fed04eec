// * Catalog sources: the live PostgreSQL connection and an in-memory stand-in

use crate::audit::discovery::{CatalogRow, PRIMARY_KEY_CATALOG_SQL};
use crate::audit::errors::{AuditError, AuditResult};
use crate::audit::probe::ProbeQuery;
use crate::config::DbConfig;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use tokio_postgres::{Client, NoTls};

/// Type alias for async result
pub type AsyncResult<'a, T> = Pin<Box<dyn Future<Output = AuditResult<T>> + Send + 'a>>;

/// Anything that can answer the two questions an audit asks
pub trait CatalogSource: Send + Sync {
    /// Returns primary-key metadata rows
    fn fetch_catalog(&self) -> AsyncResult<'_, Vec<CatalogRow>>;

    /// Returns the current maximum for one probe target (0 for an empty table)
    fn fetch_max<'a>(&'a self, probe: &'a ProbeQuery) -> AsyncResult<'a, i64>;
}

/// Live PostgreSQL source over a single read-only session
pub struct PgCatalogSource {
    client: Client,
}

impl std::fmt::Debug for PgCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCatalogSource")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl PgCatalogSource {
    /// Connects and pins the session to read-only transactions.
    ///
    /// The connection driver runs on a spawned task and ends when the client drops.
    pub async fn connect(config: &DbConfig) -> AuditResult<Self> {
        let source = Self::connect_with(config.to_pg_config()?, config.statement_timeout_ms).await?;
        tracing::debug!(
            target_db = %config.describe(),
            statement_timeout_ms = config.statement_timeout_ms,
            "Connected to database"
        );
        Ok(source)
    }

    /// Same as [`PgCatalogSource::connect`] for a prepared driver config
    pub async fn connect_with(
        pg_config: tokio_postgres::Config,
        statement_timeout_ms: u64,
    ) -> AuditResult<Self> {
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(AuditError::connection)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Database connection error");
            }
        });

        let mut session = String::from("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY;");
        if statement_timeout_ms > 0 {
            session.push_str(&format!(" SET statement_timeout = {};", statement_timeout_ms));
        }
        client
            .batch_execute(&session)
            .await
            .map_err(AuditError::connection)?;

        Ok(Self { client })
    }

    /// Wraps an already-connected client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl CatalogSource for PgCatalogSource {
    fn fetch_catalog(&self) -> AsyncResult<'_, Vec<CatalogRow>> {
        Box::pin(async move {
            let rows = self
                .client
                .query(PRIMARY_KEY_CATALOG_SQL, &[])
                .await
                .map_err(AuditError::metadata)?;
            rows.iter()
                .map(CatalogRow::from_row)
                .collect::<AuditResult<Vec<_>>>()
        })
    }

    fn fetch_max<'a>(&'a self, probe: &'a ProbeQuery) -> AsyncResult<'a, i64> {
        Box::pin(async move {
            let row = self
                .client
                .query_one(probe.sql(), &[])
                .await
                .map_err(|e| AuditError::probe(probe.spec(), e))?;
            row.try_get::<_, i64>(0)
                .map_err(|e| AuditError::probe(probe.spec(), e))
        })
    }
}

type ColumnKey = (String, String, String);

fn key_of(schema: &str, table: &str, column: &str) -> ColumnKey {
    (schema.to_string(), table.to_string(), column.to_string())
}

/// In-memory catalog for tests and dry runs.
///
/// Tables without a recorded maximum behave as empty.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    rows: Vec<CatalogRow>,
    maxima: HashMap<ColumnKey, i64>,
    failing_probes: HashSet<ColumnKey>,
    catalog_failure: Option<String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw catalog row
    pub fn with_row(mut self, row: CatalogRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Adds a primary-key column together with its current maximum
    pub fn with_table(
        mut self,
        schema: &str,
        table: &str,
        column: &str,
        type_name: &str,
        storage_width: i16,
        max_value: i64,
    ) -> Self {
        self.rows.push(CatalogRow::primary_key(
            schema,
            table,
            column,
            type_name,
            storage_width,
        ));
        self.maxima.insert(key_of(schema, table, column), max_value);
        self
    }

    /// Records the current maximum for an already-added column
    pub fn with_max(mut self, schema: &str, table: &str, column: &str, max_value: i64) -> Self {
        self.maxima.insert(key_of(schema, table, column), max_value);
        self
    }

    /// Makes the probe for one column fail
    pub fn fail_probe(mut self, schema: &str, table: &str, column: &str) -> Self {
        self.failing_probes.insert(key_of(schema, table, column));
        self
    }

    /// Makes the catalog scan fail
    pub fn fail_catalog(mut self, message: impl Into<String>) -> Self {
        self.catalog_failure = Some(message.into());
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl CatalogSource for InMemoryCatalog {
    fn fetch_catalog(&self) -> AsyncResult<'_, Vec<CatalogRow>> {
        let result = match &self.catalog_failure {
            Some(message) => Err(AuditError::Source(message.clone())),
            None => Ok(self.rows.clone()),
        };
        Box::pin(async move { result })
    }

    fn fetch_max<'a>(&'a self, probe: &'a ProbeQuery) -> AsyncResult<'a, i64> {
        let spec = probe.spec();
        let key = key_of(spec.schema(), spec.table(), spec.column());
        let result = if self.failing_probes.contains(&key) {
            Err(AuditError::Source(format!(
                "relation {} is not readable",
                spec.label()
            )))
        } else {
            Ok(self.maxima.get(&key).copied().unwrap_or(0))
        };
        Box::pin(async move { result })
    }
}

// * Shared ownership, as handed to concurrent callers
impl<T: CatalogSource + ?Sized> CatalogSource for std::sync::Arc<T> {
    fn fetch_catalog(&self) -> AsyncResult<'_, Vec<CatalogRow>> {
        (**self).fetch_catalog()
    }

    fn fetch_max<'a>(&'a self, probe: &'a ProbeQuery) -> AsyncResult<'a, i64> {
        (**self).fetch_max(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::column::ColumnSpec;

    #[tokio::test]
    async fn test_in_memory_max_defaults_to_zero() {
        let catalog = InMemoryCatalog::new()
            .with_row(CatalogRow::primary_key("public", "empty_tbl", "id", "integer", 4));
        let spec = ColumnSpec::new("public", "empty_tbl", "id", "integer", 4).unwrap();
        let max = catalog.fetch_max(&ProbeQuery::for_column(&spec)).await.unwrap();
        assert_eq!(max, 0);
    }

    #[tokio::test]
    async fn test_in_memory_recorded_max() {
        let catalog =
            InMemoryCatalog::new().with_table("public", "stories", "stories_id", "bigint", 8, 1234);
        let spec = ColumnSpec::new("public", "stories", "stories_id", "bigint", 8).unwrap();
        let max = catalog.fetch_max(&ProbeQuery::for_column(&spec)).await.unwrap();
        assert_eq!(max, 1234);
        assert_eq!(catalog.row_count(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_probe_failure() {
        let catalog = InMemoryCatalog::new()
            .with_table("public", "locked", "id", "integer", 4, 10)
            .fail_probe("public", "locked", "id");
        let spec = ColumnSpec::new("public", "locked", "id", "integer", 4).unwrap();
        let result = catalog.fetch_max(&ProbeQuery::for_column(&spec)).await;
        assert!(matches!(result, Err(AuditError::Source(_))));
    }

    #[tokio::test]
    async fn test_arc_source_delegates() {
        let catalog = std::sync::Arc::new(
            InMemoryCatalog::new().with_table("public", "stories", "stories_id", "bigint", 8, 7),
        );
        let rows = catalog.fetch_catalog().await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
