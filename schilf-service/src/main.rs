mod args_parse;

use std::{fs::read_to_string, path::Path};

use crate::args_parse::Args;

use anyhow::{Context, Result};
use clap::Parser;
use schilf_service::{export_once, LoadConfiguration, SchilfService, ServiceConfiguration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, --log-level wins over RUST_LOG
    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load the configuration from the specified YAML file
    let config_content = read_to_string(Path::new(&args.config_file))
        .with_context(|| format!("Failed to read config file {}", args.config_file))?;
    let load_config: LoadConfiguration = serde_yaml::from_str(&config_content)?;
    let service_config: ServiceConfiguration = load_config.try_into()?;

    if args.export_once {
        let report = export_once(service_config).await?;
        info!(
            exported = report.exported,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Single export pass completed"
        );
        return Ok(());
    }

    let service = SchilfService::start(service_config).await?;
    info!("Schilf telemetry service has started successfully");

    tokio::signal::ctrl_c()
        .await
        .context("unable to listen for shutdown signal")?;
    info!("Shutdown requested");

    service.shutdown().await;
    Ok(())
}
