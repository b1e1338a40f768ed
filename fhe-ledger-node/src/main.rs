use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use color_eyre::Result;
use fhe_ledger_node::config::{load_config, ConfigFormat};
use fhe_ledger_node::service::{epoch_millis, NodeService};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fhe-ledger-node",
    version,
    about = "Reference node that replays an encrypted-ledger scenario against a local oracle"
)]
struct Cli {
    /// Path to configuration file (TOML or YAML).
    #[arg(long, default_value = "configs/fhe-ledger-node.toml")]
    config: PathBuf,
    /// Explicit configuration format override.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    config_format: ConfigFormat,
    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = load_config(&cli.config, cli.config_format)?;
    let mut service = NodeService::from_config(&config)?;
    let now_ms = epoch_millis(SystemTime::now())?;
    let report = service.run_scenario(now_ms)?;

    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }
    for revealed in &report.revealed {
        println!("{}", serde_json::to_string(revealed)?);
    }
    println!(
        "scenario stored {} variables and {} operations, revealed {} values",
        report.variables,
        report.operations,
        report.revealed.len()
    );
    Ok(())
}
