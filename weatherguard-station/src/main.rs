//! `weatherguard [config.json]`
//!
//! Loads the configuration, replays readings from the configured interface
//! path and publishes smoothed values until interrupted.

use anyhow::{bail, Context};
use tokio::sync::watch;
use weatherguard_core::StationError;
use weatherguard_station::config::DEFAULT_CONFIG_PATH;
use weatherguard_station::{assemble, ReplayDriver, Scheduler, StationConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config =
        StationConfig::load(&path).with_context(|| format!("loading configuration {}", path))?;

    let station = assemble(&config).context("setting up sinks")?;
    let mut scheduler = Scheduler::new(
        station.poll,
        ReplayDriver::new(),
        config.poll_interval(),
        config.read_timeout(),
    );

    if let Err(e) = scheduler.start(&config.i2c_adaptor) {
        if let StationError::DriverInit(ref cause) = e {
            bail!(
                "{}: sensor on {} unavailable ({}), not retrying",
                config.name,
                config.i2c_adaptor,
                cause
            );
        }
        return Err(e.into());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // The sender lives in this task; parking it keeps the scheduler running
                log::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    scheduler.run(shutdown_rx).await?;

    if let Some(task) = station.mqtt_task {
        task.abort();
    }
    Ok(())
}
