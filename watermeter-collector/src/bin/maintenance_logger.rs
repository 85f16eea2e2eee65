use anyhow::Result;
use clap::{CommandFactory, Parser};
use watermeter_collector::{
    config::AppConfig,
    maintenance::{self, Cli},
    observability,
};
use watermeter_db::db;

/// Log and report water system maintenance (salt refills, filter changes, ...).
///
/// Usage:
///   maintenance_logger <salt|log|list|last-salt|last-change> [options]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let mut conn = db::connect(&cfg.connection_settings()).await?;
    tracing::info!(database = %cfg.db_name, host = %cfg.db_host, "connected to database");

    let result = maintenance::execute(&mut conn, &cfg.meter_id, &command).await;
    db::close(conn).await;
    result?;

    Ok(())
}
