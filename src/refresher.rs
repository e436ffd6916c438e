//! Periodic fetch cycles publishing new rate snapshots.

use crate::core::aggregate::aggregate;
use crate::core::cache::RateCache;
use crate::core::config::AppConfig;
use crate::core::rates::{CurrencyCode, RateSample, RateTable};
use crate::providers::util::build_client;
use crate::providers::{ExchangerSource, PlatformSource, RateSource, SourceOutcome};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument};

/// Summary of one fetch cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub generation: u64,
    pub crypto_samples: usize,
    pub fiat_samples: usize,
    pub failures: usize,
    pub crypto_available: usize,
    pub crypto_unavailable: usize,
    pub fiat_available: usize,
}

pub struct Refresher {
    client: reqwest::Client,
    crypto_sources: Vec<Box<dyn RateSource>>,
    fiat_sources: Vec<Box<dyn RateSource>>,
    known_crypto: BTreeSet<CurrencyCode>,
    cache: Arc<RateCache>,
    interval: Duration,
}

impl Refresher {
    pub fn new(config: &AppConfig, cache: Arc<RateCache>) -> Result<Self> {
        let client =
            build_client(config.request_timeout()).context("Failed to build HTTP client")?;
        let symbol_map = Arc::new(config.symbols.clone());

        let crypto_sources = config
            .platform_specs()
            .into_iter()
            .map(|spec| {
                Box::new(PlatformSource::new(spec, Arc::clone(&symbol_map))) as Box<dyn RateSource>
            })
            .collect();
        let fiat_sources = config
            .exchanger_specs()
            .into_iter()
            .map(|spec| Box::new(ExchangerSource::new(spec)) as Box<dyn RateSource>)
            .collect();

        Ok(Self::with_sources(
            client,
            crypto_sources,
            fiat_sources,
            config.known_crypto(),
            cache,
            config.refresh_interval(),
        ))
    }

    /// Builds a refresher around arbitrary sources.
    pub fn with_sources(
        client: reqwest::Client,
        crypto_sources: Vec<Box<dyn RateSource>>,
        fiat_sources: Vec<Box<dyn RateSource>>,
        known_crypto: BTreeSet<CurrencyCode>,
        cache: Arc<RateCache>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            crypto_sources,
            fiat_sources,
            known_crypto,
            cache,
            interval,
        }
    }

    /// Runs one fetch cycle, crypto then fiat, and publishes both tables at once.
    #[instrument(name = "FetchCycle", skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        info!("Starting update of rates");

        let (crypto_samples, crypto_failures) = self.collect(&self.crypto_sources).await;
        let crypto = aggregate(self.known_crypto.iter().map(String::as_str), &crypto_samples);
        debug!(?crypto, "Crypto rates");

        let (fiat_samples, fiat_failures) = self.collect(&self.fiat_sources).await;
        let fiat = aggregate(std::iter::empty(), &fiat_samples);
        info!("Loaded {} fiat currencies", fiat.len());

        let mut report = CycleReport {
            crypto_samples: crypto_samples.len(),
            fiat_samples: fiat_samples.len(),
            failures: crypto_failures + fiat_failures,
            crypto_available: crypto.available_count(),
            crypto_unavailable: crypto.len() - crypto.available_count(),
            fiat_available: fiat.available_count(),
            ..Default::default()
        };
        report.generation = self.publish(crypto, fiat);

        info!(
            generation = report.generation,
            failures = report.failures,
            crypto_unavailable = report.crypto_unavailable,
            "Rates update completed"
        );
        report
    }

    fn publish(&self, crypto: RateTable, fiat: RateTable) -> u64 {
        self.cache.publish(crypto, fiat)
    }

    /// Fetches all sources of one pool concurrently and waits for every one of them.
    async fn collect(&self, sources: &[Box<dyn RateSource>]) -> (Vec<RateSample>, usize) {
        let outcomes: Vec<SourceOutcome> =
            join_all(sources.iter().map(|s| s.fetch_samples(&self.client))).await;

        let mut samples = Vec::new();
        let mut failures = 0;
        for (source, outcome) in sources.iter().zip(outcomes) {
            debug!(
                source = source.id(),
                samples = outcome.samples.len(),
                failures = outcome.errors.len(),
                "Source finished"
            );
            failures += outcome.errors.len();
            samples.extend(outcome.samples);
        }
        (samples, failures)
    }

    /// Runs a cycle immediately and then on every interval tick until
    /// `shutdown` turns `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Starting periodic update of rates");

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = self.run_cycle() => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Refresher stopped");
        })
    }
}
