use keyspace_audit::config::{AuditConfig, LogFormat};
use keyspace_audit::ops::telemetry;
use keyspace_audit::plugin::{self, PluginMode};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match AuditConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing();
            tracing::error!(error = %e, kind = e.kind(), "Configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    // * Initialize Telemetry
    match config.log_format {
        LogFormat::Json => telemetry::init_tracing_with_level(&config.log_level),
        LogFormat::Pretty => telemetry::init_tracing_pretty(&config.log_level),
    }

    let mode = match PluginMode::from_args(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "Invalid invocation");
            return ExitCode::FAILURE;
        }
    };

    match plugin::run(mode, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "Audit failed");
            ExitCode::FAILURE
        }
    }
}
