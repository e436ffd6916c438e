use crate::core::rates::{RateSnapshot, RateTable};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Holds the latest published [`RateSnapshot`].
///
/// Readers get an `Arc` to an immutable snapshot without taking a lock, so a
/// publish never blocks conversions and a conversion never sees a half
/// written pair of tables.
pub struct RateCache {
    current: ArcSwap<RateSnapshot>,
    generation: AtomicU64,
    updates: watch::Sender<u64>,
}

impl RateCache {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RateSnapshot::empty()),
            generation: AtomicU64::new(0),
            updates: watch::channel(0).0,
        }
    }

    /// Creates a cache that starts with `snapshot` instead of empty tables.
    pub fn seeded(snapshot: RateSnapshot) -> Self {
        let cache = Self::new();
        cache.seed(snapshot);
        cache
    }

    /// Replaces the visible snapshot with `snapshot`, keeping its timestamp.
    pub fn seed(&self, mut snapshot: RateSnapshot) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.generation = generation;
        self.current.store(Arc::new(snapshot));
        self.notify(generation);
        debug!(generation, "Cache SEED");
        generation
    }

    /// Atomically publishes both tables as one new snapshot.
    pub fn publish(&self, crypto: RateTable, fiat: RateTable) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = RateSnapshot {
            crypto,
            fiat,
            updated_at: Utc::now(),
            generation,
        };
        self.current.store(Arc::new(snapshot));
        self.notify(generation);
        debug!(generation, "Cache PUBLISH");
        generation
    }

    /// Receiver tracking the generation of the latest stored snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Waits until a snapshot of at least `generation` is visible.
    pub async fn wait_for_generation(&self, generation: u64) {
        let mut updates = self.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = updates.wait_for(|current| *current >= generation).await;
    }

    fn notify(&self, generation: u64) {
        // Concurrent publishers may finish out of order
        self.updates.send_if_modified(|current| {
            if generation > *current {
                *current = generation;
                true
            } else {
                false
            }
        });
    }

    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.current.load_full()
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}
