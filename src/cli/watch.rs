use super::rates::snapshot_json;
use crate::core::config::AppConfig;
use crate::service::RatesService;
use anyhow::{Context, Result};
use tracing::info;

/// Keeps the refresher running until Ctrl+C, printing every published snapshot.
pub async fn run(config: &AppConfig) -> Result<()> {
    let service = RatesService::start(config)?;
    info!(
        interval_secs = config.refresh_interval_secs,
        "Watching rates, press Ctrl+C to stop"
    );

    let mut updates = service.subscribe();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown signal received");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", snapshot_json(&service.snapshot()));
            }
        }
    }

    service.shutdown().await
}
