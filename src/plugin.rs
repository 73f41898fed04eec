// * Plugin entry point: one audit pass, then render to stdout
// * Output is buffered so a fatal error leaves stdout empty

use crate::audit::{AuditError, AuditResult, Auditor, CatalogSource, PgCatalogSource, Report};
use crate::config::AuditConfig;
use crate::ops::alerting::AlertManager;
use crate::output;
use std::io::Write;

/// Invocation mode, following Munin's plugin argument convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginMode {
    /// No argument: print current values
    Fetch,
    /// `config`: print graph and field definitions
    Config,
    /// `autoconf`: report whether the plugin can run here
    Autoconf,
}

impl PluginMode {
    /// Parses the arguments after the program name
    pub fn from_args<I, S>(args: I) -> AuditResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        let mode = match args.next() {
            None => PluginMode::Fetch,
            Some(arg) => match arg.as_ref() {
                "fetch" => PluginMode::Fetch,
                "config" => PluginMode::Config,
                "autoconf" => PluginMode::Autoconf,
                other => {
                    return Err(AuditError::Config(format!("unknown argument '{}'", other)));
                }
            },
        };
        if let Some(extra) = args.next() {
            return Err(AuditError::Config(format!(
                "unexpected extra argument '{}'",
                extra.as_ref()
            )));
        }
        Ok(mode)
    }
}

/// Audits `source` and returns the rendered output for `mode`.
///
/// Alerts for descriptors past their thresholds are dispatched to `alerts`.
pub async fn execute<S: CatalogSource>(
    source: S,
    mode: PluginMode,
    config: &AuditConfig,
    alerts: &AlertManager,
) -> AuditResult<Vec<u8>> {
    let auditor = Auditor::with_options(source, config.audit_options());
    let report: Report = auditor.run().await?;
    let descriptors = report.descriptors(config.thresholds);

    let mut buffer = Vec::new();
    match mode {
        PluginMode::Config => output::munin::write_config(&mut buffer, &descriptors)?,
        PluginMode::Fetch | PluginMode::Autoconf => {
            alerts.evaluate(&descriptors);
            output::render(&mut buffer, config.output, &report, &descriptors)?;
        }
    }
    Ok(buffer)
}

/// Autoconf answer: `yes`, or `no (<reason>)`
pub async fn autoconf(config: &AuditConfig) -> String {
    match PgCatalogSource::connect(&config.db).await {
        Ok(source) => match source.fetch_catalog().await {
            Ok(_) => "yes".to_string(),
            Err(e) => format!("no ({})", e),
        },
        Err(e) => format!("no ({})", e),
    }
}

/// Runs the plugin against the configured database and writes to stdout
pub async fn run(mode: PluginMode, config: &AuditConfig) -> AuditResult<()> {
    let buffer = if mode == PluginMode::Autoconf {
        format!("{}\n", autoconf(config).await).into_bytes()
    } else {
        tracing::info!(
            target_db = %config.db.describe(),
            mode = ?mode,
            output = ?config.output,
            "Starting key space audit"
        );
        let source = PgCatalogSource::connect(&config.db).await?;
        execute(source, mode, config, &AlertManager::new()).await?
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buffer)?;
    stdout.flush()?;
    Ok(())
}
