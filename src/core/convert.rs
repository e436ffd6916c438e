//! Cross-rate conversion against the latest published snapshot.

use crate::core::cache::RateCache;
use crate::core::error::ConversionError;
use crate::core::rates::{Rate, RateSnapshot, round_to};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Crypto currency every crypto price is quoted against.
pub const ANCHOR_CURRENCY: &str = "USDT";

/// Decimal places kept for converted amounts.
pub const CONVERSION_PRECISION: i32 = 8;

/// How a currency without a usable rate is treated during conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelPolicy {
    /// Reject the conversion with [`ConversionError::RateUnavailable`].
    #[default]
    Strict,
    /// Compute with the `-1` sentinel as if it were a rate.
    Legacy,
}

pub struct ConversionEngine {
    cache: Arc<RateCache>,
    policy: SentinelPolicy,
}

impl ConversionEngine {
    pub fn new(cache: Arc<RateCache>) -> Self {
        Self::with_policy(cache, SentinelPolicy::default())
    }

    pub fn with_policy(cache: Arc<RateCache>, policy: SentinelPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.cache.snapshot()
    }

    /// Converts `amount` of `from` into `to`. Codes are expected uppercase.
    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, ConversionError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ConversionError::InvalidAmount(amount));
        }

        let snapshot = self.cache.snapshot();
        let rate_from = self.resolve(&snapshot, from)?;
        let rate_to = self.resolve(&snapshot, to)?;

        if rate_to == 0.0 {
            error!(currency = to, "Target rate resolved to zero");
            return Err(ConversionError::ZeroRate(to.to_string()));
        }

        let raw = amount * rate_from / rate_to;
        if !raw.is_finite() {
            error!(currency = from, target = to, amount, "Conversion overflowed");
            return Err(ConversionError::Overflow {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let converted = round_to(raw, CONVERSION_PRECISION);
        debug!(
            from,
            to,
            amount,
            rate_from,
            rate_to,
            converted,
            generation = snapshot.generation,
            "Converted"
        );
        Ok(converted)
    }

    /// USD-equivalent rate of `code` in the current snapshot.
    pub fn rate_in_usd(&self, code: &str) -> Result<f64, ConversionError> {
        self.resolve(&self.cache.snapshot(), code)
    }

    fn resolve(&self, snapshot: &RateSnapshot, code: &str) -> Result<f64, ConversionError> {
        if let Some(rate) = snapshot.crypto.get(code) {
            let price = self.usable(code, rate)?;
            let anchor = snapshot
                .crypto
                .get(ANCHOR_CURRENCY)
                .and_then(|anchor| self.usable(ANCHOR_CURRENCY, anchor).ok())
                .ok_or_else(|| {
                    error!(currency = code, "Anchor rate missing from crypto rates");
                    ConversionError::AnchorUnavailable(ANCHOR_CURRENCY.to_string())
                })?;
            return Ok(price * anchor);
        }

        if let Some(rate) = snapshot.fiat.get(code) {
            return self.usable(code, rate);
        }

        error!("Currency {} not found", code);
        Err(ConversionError::CurrencyNotFound(code.to_string()))
    }

    fn usable(&self, code: &str, rate: Rate) -> Result<f64, ConversionError> {
        match (rate, self.policy) {
            (Rate::Available(value), _) => Ok(value),
            (Rate::Unavailable, SentinelPolicy::Legacy) => Ok(rate.legacy_value()),
            (Rate::Unavailable, SentinelPolicy::Strict) => {
                Err(ConversionError::RateUnavailable(code.to_string()))
            }
        }
    }
}
