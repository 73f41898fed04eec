// * Primary-key exhaustion auditor for PostgreSQL
// * Scans the catalogs for integer primary keys and measures how much of each key space is in use
// * Reports Munin fields, JSON, a table, or Prometheus gauges

pub mod audit;
pub mod config;
pub mod ops;
pub mod output;
pub mod plugin;
