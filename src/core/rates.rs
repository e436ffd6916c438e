//! Rate tables and snapshots shared between the refresher and conversions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Value stored for a currency that had no usable sample in the last cycle.
pub const SENTINEL_RATE: f64 = -1.0;

/// Canonical currency identifier, always uppercase.
pub type CurrencyCode = String;

/// One price observation produced by a source adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    pub source_id: String,
    pub raw_symbol: String,
    pub currency: CurrencyCode,
    pub price: f64,
}

/// Aggregated rate for a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Rate {
    Available(f64),
    Unavailable,
}

impl Rate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Rate::Available(v) => Some(*v),
            Rate::Unavailable => None,
        }
    }

    /// The rate as a plain number, with [`SENTINEL_RATE`] for missing data.
    pub fn legacy_value(&self) -> f64 {
        self.value().unwrap_or(SENTINEL_RATE)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Rate::Available(_))
    }
}

/// Mapping from currency code to its aggregated rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateTable {
    rates: BTreeMap<CurrencyCode, Rate>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<CurrencyCode>, rate: Rate) {
        self.rates.insert(code.into(), rate);
    }

    pub fn get(&self, code: &str) -> Option<Rate> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.rates.values().filter(|r| r.is_available()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, &Rate)> {
        self.rates.iter()
    }
}

impl<K: Into<CurrencyCode>> FromIterator<(K, Rate)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (K, Rate)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Immutable view of both rate tables, as published by one fetch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RateSnapshot {
    pub crypto: RateTable,
    pub fiat: RateTable,
    pub updated_at: DateTime<Utc>,
    /// 0 for the empty startup snapshot, incremented on every publish.
    pub generation: u64,
}

impl RateSnapshot {
    pub fn empty() -> Self {
        Self {
            crypto: RateTable::new(),
            fiat: RateTable::new(),
            updated_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn new(crypto: RateTable, fiat: RateTable) -> Self {
        Self {
            crypto,
            fiat,
            updated_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.crypto.is_empty() && self.fiat.is_empty()
    }
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Rounds `value` to `places` decimal places.
///
/// Values too large to carry that many fractional digits are returned as-is.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    if !scaled.is_finite() || scaled.abs() >= MAX_EXACT_SCALED {
        return value;
    }
    scaled.round() / factor
}

/// Above 2^52 every f64 is already a whole number.
const MAX_EXACT_SCALED: f64 = 4_503_599_627_370_496.0;
