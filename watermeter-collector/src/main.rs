use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use watermeter_collector::{
    config::AppConfig, metrics_server, observability, shutdown, sinks::TimescaleSink,
    sources::HttpMeterSource, Daemon, DaemonSettings,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load().context("configuration error")?;
    tracing::info!(
        meter_api_url = %cfg.meter_api_url,
        collection_interval_secs = cfg.collection_interval,
        database = %format!("{}:{}/{}", cfg.db_host, cfg.db_port, cfg.db_name),
        "starting water meter daemon"
    );

    // Start metrics server if configured
    if let Some(bind_addr) = &cfg.metrics_bind_addr {
        metrics_server::init(bind_addr)?;
    }

    let shutdown_token = CancellationToken::new();
    shutdown::install(shutdown_token.clone());

    // Database and schema must be usable before polling starts.
    let sink = TimescaleSink::open(cfg.connection_settings())
        .await
        .context("initial database setup failed")?;

    let source = HttpMeterSource::new(&cfg.meter_api_url, &cfg.meter_id, cfg.meter_api_timeout())?;

    let daemon = Daemon::new(source, sink, DaemonSettings::from_config(&cfg), shutdown_token);
    let outcome = daemon.run().await;

    Ok(outcome.exit_code())
}
