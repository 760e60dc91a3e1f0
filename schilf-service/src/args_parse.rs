use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "schilf")]
#[command(about = "Sensor telemetry ingestion and daily cold-storage export", long_about = None)]
pub(crate) struct Args {
    /// Path to the YAML config file
    #[arg(long, value_name = "PATH")]
    pub(crate) config_file: String,

    /// Log filter, e.g. `info` or `schilf=debug` (defaults to RUST_LOG, then `info`)
    #[arg(long)]
    pub(crate) log_level: Option<String>,

    /// Run a single export pass and exit instead of starting the service
    #[arg(long, default_value_t = false)]
    pub(crate) export_once: bool,
}
