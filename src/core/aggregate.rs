//! Reduces the samples of one fetch cycle into a rate table.

use crate::core::rates::{Rate, RateSample, RateTable, round_to};
use std::collections::BTreeMap;
use tracing::debug;

/// Decimal places kept for aggregated rates.
pub const AGGREGATE_PRECISION: i32 = 6;

/// Builds a [`RateTable`] holding the rounded mean of the samples of every
/// currency in `known` and in `samples`. Currencies without samples are
/// marked [`Rate::Unavailable`].
pub fn aggregate<'a, I>(known: I, samples: &[RateSample]) -> RateTable
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buckets: BTreeMap<&str, Vec<f64>> =
        known.into_iter().map(|code| (code, Vec::new())).collect();

    for sample in samples {
        buckets
            .entry(sample.currency.as_str())
            .or_default()
            .push(sample.price);
    }

    buckets
        .into_iter()
        .map(|(code, prices)| {
            let rate = mean(&prices)
                .map(|m| Rate::Available(round_to(m, AGGREGATE_PRECISION)))
                .unwrap_or(Rate::Unavailable);
            debug!(currency = code, samples = prices.len(), ?rate, "Aggregated");
            (code.to_string(), rate)
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: &str, currency: &str, price: f64) -> RateSample {
        RateSample {
            source_id: source.to_string(),
            raw_symbol: format!("{currency}USDT"),
            currency: currency.to_string(),
            price,
        }
    }

    #[test]
    fn test_mean_of_collected_samples() {
        let samples = vec![
            sample("Binance", "BTC", 50000.0),
            sample("Bybit", "BTC", 50010.0),
            sample("BitFinex", "BTC", 50020.5),
        ];

        let table = aggregate(["BTC"], &samples);
        assert_eq!(table.get("BTC"), Some(Rate::Available(50010.166667)));
    }

    #[test]
    fn test_known_currency_without_samples_is_unavailable() {
        let samples = vec![sample("Binance", "BTC", 50000.0)];

        let table = aggregate(["BTC", "ETH"], &samples);
        assert_eq!(table.get("ETH"), Some(Rate::Unavailable));
        assert_eq!(table.get("ETH").unwrap().legacy_value(), -1.0);
    }

    #[test]
    fn test_observed_currencies_are_added() {
        let samples = vec![sample("Openexchange", "EUR", 1.0 / 0.9)];

        let table = aggregate(std::iter::empty(), &samples);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("EUR"), Some(Rate::Available(1.111111)));
    }

    #[test]
    fn test_rounds_to_six_places() {
        let samples = vec![sample("a", "X", 0.1234561), sample("b", "X", 0.1234579)];

        let table = aggregate(["X"], &samples);
        assert_eq!(table.get("X"), Some(Rate::Available(0.123457)));
    }
}
