//! Long-running conversion service: a background refresher plus a conversion engine
//! reading the snapshots it publishes.

use crate::core::cache::RateCache;
use crate::core::config::AppConfig;
use crate::core::convert::ConversionEngine;
use crate::core::error::ConversionError;
use crate::core::rates::RateSnapshot;
use crate::refresher::{CycleReport, Refresher};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct RatesService {
    engine: ConversionEngine,
    cache: Arc<RateCache>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RatesService {
    /// Starts the background refresher. The first cycle begins immediately;
    /// until it completes conversions see an empty cache.
    pub fn start(config: &AppConfig) -> Result<Self> {
        Self::start_with_cache(config, Arc::new(RateCache::new()))
    }

    /// Like [`RatesService::start`] but serving from a pre-seeded cache.
    pub fn start_with_cache(config: &AppConfig, cache: Arc<RateCache>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let refresher = Refresher::new(config, Arc::clone(&cache))?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = refresher.spawn(shutdown_rx);

        Ok(Self {
            engine: ConversionEngine::with_policy(Arc::clone(&cache), config.sentinel_policy),
            cache,
            shutdown,
            handle,
        })
    }

    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, ConversionError> {
        self.engine.convert(from, to, amount)
    }

    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.cache.snapshot()
    }

    /// Notifies with the generation of every newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    /// Waits until a snapshot of at least `generation` has been published.
    pub async fn wait_for_generation(&self, generation: u64) {
        self.cache.wait_for_generation(generation).await;
    }

    /// Signals the refresher to stop and waits for it, cancelling any cycle in flight.
    pub async fn shutdown(self) -> Result<()> {
        // The receiver may already be gone if the task ended on its own
        let _ = self.shutdown.send(true);
        self.handle.await.context("Refresher task failed")?;
        info!("Rates service stopped");
        Ok(())
    }
}

/// Runs a single fetch cycle into a fresh cache and returns an engine over it.
pub async fn refresh_once(config: &AppConfig) -> Result<(ConversionEngine, CycleReport)> {
    let cache = Arc::new(RateCache::new());
    let refresher = Refresher::new(config, Arc::clone(&cache))?;
    let report = refresher.run_cycle().await;
    Ok((
        ConversionEngine::with_policy(cache, config.sentinel_policy),
        report,
    ))
}
