// * Runtime configuration
// * Everything comes from environment variables, which is how Munin hands settings to plugins
// * (`env.PGHOST` and friends in the plugin config)

pub mod constants;

use crate::audit::errors::{AuditError, AuditResult};
use crate::audit::{AuditOptions, ProbePolicy};
use crate::ops::alerting::Thresholds;
use constants::*;
use std::str::FromStr;
use std::time::Duration;

/// Where plugin output goes and how it is shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Munin `field.value` lines
    #[default]
    Munin,
    /// Aligned human-readable table
    Table,
    /// JSON array of metric descriptors
    Json,
    /// Prometheus text exposition
    Prometheus,
}

impl FromStr for OutputFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "munin" => Ok(OutputFormat::Munin),
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "prometheus" | "prom" => Ok(OutputFormat::Prometheus),
            other => Err(AuditError::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// Log line formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(AuditError::Config(format!("unknown log format '{}'", other))),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full connection string; wins over the individual parts when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    /// Session statement timeout in milliseconds, 0 for none
    pub statement_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_PG_HOST.to_string(),
            port: DEFAULT_PG_PORT,
            dbname: DEFAULT_PG_DATABASE.to_string(),
            user: DEFAULT_PG_USER.to_string(),
            password: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
        }
    }
}

impl DbConfig {
    /// Builds the driver configuration
    pub fn to_pg_config(&self) -> AuditResult<tokio_postgres::Config> {
        let mut config = match &self.url {
            Some(url) => url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| AuditError::Config(format!("invalid database url: {}", e)))?,
            None => {
                let mut config = tokio_postgres::Config::new();
                config
                    .host(&self.host)
                    .port(self.port)
                    .dbname(&self.dbname)
                    .user(&self.user);
                if let Some(password) = &self.password {
                    config.password(password);
                }
                config
            }
        };
        config
            .connect_timeout(self.connect_timeout)
            .application_name(APPLICATION_NAME);
        Ok(config)
    }

    /// Connection target without credentials, for logs
    pub fn describe(&self) -> String {
        match &self.url {
            Some(_) => "database url".to_string(),
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname),
        }
    }
}

/// Complete auditor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub db: DbConfig,
    pub thresholds: Thresholds,
    pub probe_concurrency: usize,
    pub skip_failed_probes: bool,
    pub output: OutputFormat,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            thresholds: Thresholds::default(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            skip_failed_probes: false,
            output: OutputFormat::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AuditConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> AuditResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> AuditResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let db = DbConfig {
            url: get("KEYSPACE_DATABASE_URL"),
            host: get("PGHOST").unwrap_or(defaults.db.host),
            port: parse_var(&get, "PGPORT")?.unwrap_or(defaults.db.port),
            dbname: get("PGDATABASE").unwrap_or(defaults.db.dbname),
            user: get("PGUSER").unwrap_or(defaults.db.user),
            password: get("PGPASSWORD"),
            connect_timeout: parse_var(&get, "KEYSPACE_CONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.db.connect_timeout),
            statement_timeout_ms: parse_var(&get, "KEYSPACE_STATEMENT_TIMEOUT_MS")?
                .unwrap_or(defaults.db.statement_timeout_ms),
        };

        let config = Self {
            db,
            thresholds: Thresholds::new(
                parse_var(&get, "KEYSPACE_WARNING")?.unwrap_or(defaults.thresholds.warning),
                parse_var(&get, "KEYSPACE_CRITICAL")?.unwrap_or(defaults.thresholds.critical),
            ),
            probe_concurrency: parse_var(&get, "KEYSPACE_PROBE_CONCURRENCY")?
                .unwrap_or(defaults.probe_concurrency),
            skip_failed_probes: get("KEYSPACE_SKIP_FAILED_PROBES")
                .map(|v| parse_bool("KEYSPACE_SKIP_FAILED_PROBES", &v))
                .transpose()?
                .unwrap_or(defaults.skip_failed_probes),
            output: get("KEYSPACE_OUTPUT")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(defaults.output),
            log_level: get("KEYSPACE_LOG").unwrap_or(defaults.log_level),
            log_format: get("KEYSPACE_LOG_FORMAT")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(defaults.log_format),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects inconsistent settings
    pub fn validate(&self) -> AuditResult<()> {
        let Thresholds { warning, critical } = self.thresholds;
        if !(0..=100).contains(&warning) || !(0..=100).contains(&critical) {
            return Err(AuditError::Config(format!(
                "thresholds must lie within 0..=100 (warning {}, critical {})",
                warning, critical
            )));
        }
        if warning > critical {
            return Err(AuditError::Config(format!(
                "warning threshold {} exceeds critical threshold {}",
                warning, critical
            )));
        }
        if self.probe_concurrency == 0 {
            return Err(AuditError::Config(
                "probe concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Audit options derived from this configuration
    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            probe_concurrency: self.probe_concurrency,
            policy: if self.skip_failed_probes {
                ProbePolicy::SkipAndLog
            } else {
                ProbePolicy::Abort
            },
        }
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> AuditResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| AuditError::Config(format!("{}={}: {}", key, raw, e)))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> AuditResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AuditError::Config(format!("{}={}: expected a boolean", key, raw))),
    }
}
