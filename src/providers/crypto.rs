use super::parsers::{QuoteParser, quote_parser};
use super::util::fetch_json;
use super::{RateSource, SourceOutcome};
use crate::core::config::{PlatformSpec, canonical_code};
use crate::core::error::SourceError;
use crate::core::rates::{CurrencyCode, RateSample};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Crypto platform queried once per configured symbol.
pub struct PlatformSource {
    spec: PlatformSpec,
    parser: Option<Box<dyn QuoteParser>>,
    symbol_map: Arc<BTreeMap<String, CurrencyCode>>,
}

impl PlatformSource {
    pub fn new(spec: PlatformSpec, symbol_map: Arc<BTreeMap<String, CurrencyCode>>) -> Self {
        let parser = quote_parser(spec.parser);
        Self {
            spec,
            parser,
            symbol_map,
        }
    }

    async fn fetch_symbol(
        &self,
        client: &reqwest::Client,
        parser: &dyn QuoteParser,
        symbol: &str,
    ) -> Result<RateSample, SourceError> {
        let url = self.spec.url_for(symbol);
        let body = fetch_json(client, &self.spec.id, symbol, &url).await?;

        let price = parser
            .parse_price(&body)
            .map_err(|message| SourceError::Parse {
                source_id: self.spec.id.clone(),
                target: symbol.to_string(),
                message,
            })?;

        Ok(RateSample {
            source_id: self.spec.id.clone(),
            raw_symbol: symbol.to_string(),
            currency: canonical_code(&self.symbol_map, symbol),
            price,
        })
    }
}

#[async_trait]
impl RateSource for PlatformSource {
    fn id(&self) -> &str {
        &self.spec.id
    }

    #[instrument(name = "PlatformFetch", skip(self, client), fields(platform = %self.spec.id))]
    async fn fetch_samples(&self, client: &reqwest::Client) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();

        let Some(parser) = self.parser.as_deref() else {
            warn!(
                parser = ?self.spec.parser,
                "No price parser for platform, skipping"
            );
            return outcome;
        };

        for symbol in &self.spec.symbols {
            match self.fetch_symbol(client, parser, symbol).await {
                Ok(sample) => {
                    debug!(symbol, currency = %sample.currency, price = sample.price, "Got price");
                    outcome.samples.push(sample);
                }
                Err(e) => {
                    match &e {
                        SourceError::Parse { .. } => error!(
                            "Error occurred while fetching data for {} and {}: {}",
                            self.spec.id, symbol, e
                        ),
                        _ => warn!(symbol, error = %e, "Skipping symbol"),
                    }
                    outcome.errors.push(e);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ParserKind;
    use crate::providers::util::build_client;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn symbol_map() -> Arc<BTreeMap<String, CurrencyCode>> {
        Arc::new(
            [("BTCUSDT", "BTC"), ("ETHUSDT", "ETH")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    async fn mock_ticker(server: &MockServer, symbol: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .and(query_param("symbol", symbol))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn platform(server: &MockServer, symbols: &[&str], parser: ParserKind) -> PlatformSource {
        let spec = PlatformSpec {
            id: "Binance".to_string(),
            url_template: format!("{}/api/v3/ticker/price?symbol={{symbol}}", server.uri()),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            parser,
        };
        PlatformSource::new(spec, symbol_map())
    }

    #[tokio::test]
    async fn test_fetches_each_symbol() {
        let server = MockServer::start().await;
        mock_ticker(&server, "BTCUSDT", 200, r#"{"symbol":"BTCUSDT","price":"50000.10"}"#).await;
        mock_ticker(&server, "ETHUSDT", 200, r#"{"symbol":"ETHUSDT","price":"3000.00"}"#).await;
        mock_ticker(&server, "USDT", 200, r#"{"price":"1.0001"}"#).await;

        let source = platform(&server, &["BTCUSDT", "ETHUSDT", "USDT"], ParserKind::Price);
        let client = build_client(Duration::from_secs(5)).unwrap();
        let outcome = source.fetch_samples(&client).await;

        assert!(outcome.errors.is_empty());
        let got: Vec<(&str, &str, f64)> = outcome
            .samples
            .iter()
            .map(|s| (s.raw_symbol.as_str(), s.currency.as_str(), s.price))
            .collect();
        assert_eq!(
            got,
            vec![
                ("BTCUSDT", "BTC", 50000.10),
                ("ETHUSDT", "ETH", 3000.0),
                ("USDT", "USDT", 1.0001),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_symbols_are_skipped() {
        let server = MockServer::start().await;
        mock_ticker(&server, "BTCUSDT", 500, "").await;
        mock_ticker(&server, "ETHUSDT", 200, r#"{"code":-1121,"msg":"Invalid symbol."}"#).await;
        mock_ticker(&server, "USDT", 200, r#"{"price":"0.9998"}"#).await;

        let source = platform(&server, &["BTCUSDT", "ETHUSDT", "USDT"], ParserKind::Price);
        let client = build_client(Duration::from_secs(5)).unwrap();
        let outcome = source.fetch_samples(&client).await;

        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.samples[0].currency, "USDT");
        assert_eq!(outcome.errors.len(), 2);
        assert!(matches!(outcome.errors[0], SourceError::Status { status: 500, .. }));
        assert!(matches!(&outcome.errors[1], SourceError::Parse { target, .. } if target == "ETHUSDT"));
    }

    #[tokio::test]
    async fn test_unsupported_platform_yields_nothing() {
        let server = MockServer::start().await;
        let source = platform(&server, &["BTCUSDT"], ParserKind::Unsupported);
        let client = build_client(Duration::from_secs(5)).unwrap();

        let outcome = source.fetch_samples(&client).await;
        assert!(outcome.samples.is_empty());
        assert!(outcome.errors.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
