//! `tandem` demo binary.
//!
//! Loads configuration, installs logging and the Prometheus recorder,
//! registers the built-in health service and runs the supervisor until a
//! termination signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use tandem::config::{self, ServerConfig};
use tandem::observability::{logging, metrics};
use tandem::service::health::BuildInfo;
use tandem::{Closer, HealthService, Supervisor};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Serve a gRPC transport and its HTTP gateway", long_about = None)]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::from_env()?,
    };

    if cli.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level, config.observability.json_logs)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        app = %config.observability.app_name,
        environment = %config.observability.environment,
        "tandem starting"
    );

    let supervisor = build_supervisor(config)?;
    supervisor.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_supervisor(config: ServerConfig) -> Result<Supervisor, Box<dyn std::error::Error>> {
    let info = BuildInfo::from_config(&config.observability);

    let supervisor = if config.gateway.disable_prometheus {
        Supervisor::new(config)
    } else {
        let handle = metrics::install_recorder()?;
        let upkeep = metrics::spawn_upkeep(handle.clone(), METRICS_UPKEEP_INTERVAL);
        let supervisor = Supervisor::with_metrics(config, handle);
        supervisor.add_closer(Closer::new("metrics-upkeep", move || upkeep.abort()));
        supervisor
    };

    supervisor.set_service(Arc::new(HealthService::new(info)))?;
    Ok(supervisor)
}
