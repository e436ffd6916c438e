//! Response schemas of the supported price sources.

use crate::core::config::ParserKind;
use serde_json::Value;

/// Extracts the last traded price from a single-symbol ticker response.
pub trait QuoteParser: Send + Sync {
    fn parse_price(&self, body: &Value) -> Result<f64, String>;
}

/// Extracts a full `code -> raw rate` table from an exchanger response.
pub trait RatesParser: Send + Sync {
    /// Returns parsed entries and the codes of entries that were skipped.
    fn parse_rates(&self, body: &Value) -> Result<ParsedRates, String>;
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedRates {
    pub rates: Vec<(String, f64)>,
    pub skipped: Vec<String>,
}

/// `{"symbol": "BTCUSDT", "price": "50000.00"}`
pub struct TopLevelPrice;

/// `{"result": {"list": [{"lastPrice": "50000.00"}]}}`
pub struct BybitTicker;

/// `[bid, bid_size, ask, ask_size, change, change_pct, last_price, volume, high, low]`
pub struct BitfinexTicker;

/// `{"result": {"priceUsd": 50000.0}}`
pub struct SolarpathQuote;

/// `{"base": "USD", "rates": {"EUR": 0.9, ...}}`
pub struct OpenExchangeRates;

const BITFINEX_LAST_PRICE_INDEX: usize = 6;

impl QuoteParser for TopLevelPrice {
    fn parse_price(&self, body: &Value) -> Result<f64, String> {
        let value = body.get("price").ok_or("missing field 'price'")?;
        positive_number(value)
    }
}

impl QuoteParser for BybitTicker {
    fn parse_price(&self, body: &Value) -> Result<f64, String> {
        let value = body
            .pointer("/result/list/0/lastPrice")
            .ok_or("missing field 'result.list[0].lastPrice'")?;
        positive_number(value)
    }
}

impl QuoteParser for BitfinexTicker {
    fn parse_price(&self, body: &Value) -> Result<f64, String> {
        let items = body.as_array().ok_or("expected a top-level array")?;
        let value = items.get(BITFINEX_LAST_PRICE_INDEX).ok_or_else(|| {
            format!(
                "array has {} elements, expected index {}",
                items.len(),
                BITFINEX_LAST_PRICE_INDEX
            )
        })?;
        positive_number(value)
    }
}

impl QuoteParser for SolarpathQuote {
    fn parse_price(&self, body: &Value) -> Result<f64, String> {
        let value = body
            .pointer("/result/priceUsd")
            .ok_or("missing field 'result.priceUsd'")?;
        positive_number(value)
    }
}

impl RatesParser for OpenExchangeRates {
    fn parse_rates(&self, body: &Value) -> Result<ParsedRates, String> {
        let table = body
            .get("rates")
            .ok_or("missing field 'rates'")?
            .as_object()
            .ok_or("field 'rates' is not an object")?;

        let mut parsed = ParsedRates::default();
        for (code, value) in table {
            match positive_number(value) {
                Ok(rate) => parsed.rates.push((code.to_uppercase(), rate)),
                Err(_) => parsed.skipped.push(code.clone()),
            }
        }
        Ok(parsed)
    }
}

pub fn quote_parser(kind: ParserKind) -> Option<Box<dyn QuoteParser>> {
    match kind {
        ParserKind::Price => Some(Box::new(TopLevelPrice)),
        ParserKind::Bybit => Some(Box::new(BybitTicker)),
        ParserKind::Bitfinex => Some(Box::new(BitfinexTicker)),
        ParserKind::Solarpath => Some(Box::new(SolarpathQuote)),
        ParserKind::OpenExchange | ParserKind::Unsupported => None,
    }
}

pub fn rates_parser(kind: ParserKind) -> Option<Box<dyn RatesParser>> {
    match kind {
        ParserKind::OpenExchange => Some(Box::new(OpenExchangeRates)),
        _ => None,
    }
}

/// Accepts JSON numbers and numeric strings, as most tickers quote prices as strings.
fn positive_number(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{s}' is not numeric: {e}"))?,
        other => return Err(format!("expected a number, got {other}")),
    };
    if !number.is_finite() || number <= 0.0 {
        return Err(format!("price {number} is not a positive number"));
    }
    Ok(number)
}
