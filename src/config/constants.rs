// * Configuration Constants
// * Central location for all configurable thresholds and timeouts

// * Fill percentage at which a key space is reported as warning
pub const DEFAULT_WARNING_PERCENT: i64 = 85;

// * Fill percentage at which a key space is reported as critical
pub const DEFAULT_CRITICAL_PERCENT: i64 = 90;

// * Probes in flight at once; 1 keeps the audit strictly sequential
pub const DEFAULT_PROBE_CONCURRENCY: usize = 1;

// * Database connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// * Session statement timeout in milliseconds (0 disables it)
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 0;

// * Default connection parameters, matching libpq's own fallbacks
pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_PG_USER: &str = "postgres";
pub const DEFAULT_PG_DATABASE: &str = "postgres";

// * Reported to the server as application_name
pub const APPLICATION_NAME: &str = "keyspace-audit";

// * Log level used when neither RUST_LOG nor KEYSPACE_LOG is set
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// * Munin graph presentation
pub const MUNIN_GRAPH_TITLE: &str = "PostgreSQL primary key usage";
pub const MUNIN_GRAPH_VLABEL: &str = "% of key space used";
pub const MUNIN_GRAPH_CATEGORY: &str = "postgresql";
