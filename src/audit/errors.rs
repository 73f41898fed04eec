use thiserror::Error;

// * Unified Error type for the audit pipeline.
// * Every variant is fatal under the default policy: no partial report is emitted.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database connection failed: {detail}")]
    Connection {
        detail: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Schema discovery query failed: {detail}")]
    MetadataQuery {
        detail: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Maximum probe failed for {schema}.{table}.{column}: {detail}")]
    ProbeQuery {
        schema: String,
        table: String,
        column: String,
        detail: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Representable maximum {max_representable} is too small to derive a percentage")]
    DegenerateThreshold { max_representable: i64 },

    #[error("Unsupported primary key column {schema}.{table}.{column}: {reason}")]
    InvalidColumn {
        schema: String,
        table: String,
        column: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Output failed: {0}")]
    Io(#[from] std::io::Error),

    // * Raised by in-memory sources only; carries the simulated failure message.
    #[error("Catalog source error: {0}")]
    Source(String),
}

/// Server-side message and SQLSTATE when the server answered with an error.
///
/// `tokio_postgres::Error` displays only "db error" in that case; the useful
/// part lives in the attached `DbError`.
pub fn describe_pg_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        None => error.to_string(),
    }
}

impl AuditError {
    pub fn connection(source: tokio_postgres::Error) -> Self {
        AuditError::Connection {
            detail: describe_pg_error(&source),
            source,
        }
    }

    pub fn metadata(source: tokio_postgres::Error) -> Self {
        AuditError::MetadataQuery {
            detail: describe_pg_error(&source),
            source,
        }
    }

    /// Builds a probe error carrying the offending column's identity
    pub fn probe(
        spec: &crate::audit::column::ColumnSpec,
        source: tokio_postgres::Error,
    ) -> Self {
        AuditError::ProbeQuery {
            schema: spec.schema().to_string(),
            table: spec.table().to_string(),
            column: spec.column().to_string(),
            detail: describe_pg_error(&source),
            source,
        }
    }

    /// Short machine-friendly kind, used as a log field and metric label
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::Connection { .. } => "connection",
            AuditError::MetadataQuery { .. } => "metadata_query",
            AuditError::ProbeQuery { .. } => "probe_query",
            AuditError::DegenerateThreshold { .. } => "degenerate_threshold",
            AuditError::InvalidColumn { .. } => "invalid_column",
            AuditError::Config(_) => "config",
            AuditError::Io(_) => "io",
            AuditError::Source(_) => "source",
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
