use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use videoflowd::api::{run_api, ApiState};
use videoflowd::config::Config;
use videoflowd::controller::Controller;
use videoflowd::metrics::{self, MetricsState};

#[derive(Parser, Debug)]
#[command(name = "videoflowd")]
#[command(about = "OpenFlow control-plane daemon for video traffic steering")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config/videoflowd.toml")]
    config: PathBuf,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Prometheus metrics port (overrides the config file)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.controller.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    tracing::info!("Starting videoflowd (config: {:?})", args.config);

    let controller = Controller::new(&config)?;
    let _poller = controller.spawn_stats_poller();

    if let Some(ref api_config) = config.api {
        let state = ApiState {
            learning: controller.learning(),
            traffic: controller.traffic(),
            collector: controller.collector(),
            stats: controller.stats(),
        };
        let api_config = api_config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_api(api_config, state).await {
                tracing::error!("REST API error: {}", e);
            }
        });
    }

    let metrics_port = args.metrics_port.or(config.metrics.as_ref().map(|m| m.port));
    if let Some(port) = metrics_port {
        metrics::start_server(
            port,
            MetricsState {
                learning: controller.learning(),
                traffic: controller.traffic(),
                collector: controller.collector(),
                stats: controller.stats(),
            },
        );
    }

    // Switch sessions arrive from the OpenFlow protocol stack, which hands
    // events to Controller::handle_event. The daemon itself just waits for
    // shutdown.
    tracing::info!("Controller ready, waiting for switch sessions");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    Ok(())
}
