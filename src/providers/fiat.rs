use super::parsers::{RatesParser, rates_parser};
use super::util::fetch_json;
use super::{RateSource, SourceOutcome};
use crate::core::config::ExchangerSpec;
use crate::core::error::SourceError;
use crate::core::rates::RateSample;
use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

/// Fiat exchanger returning a table of rates relative to its base currency.
///
/// Raw rates are "units of target per unit of base"; samples carry the
/// reciprocal, i.e. the value of one unit of the target in the base currency.
pub struct ExchangerSource {
    spec: ExchangerSpec,
    parser: Option<Box<dyn RatesParser>>,
}

impl ExchangerSource {
    pub fn new(spec: ExchangerSpec) -> Self {
        let parser = rates_parser(spec.parser);
        Self { spec, parser }
    }
}

#[async_trait]
impl RateSource for ExchangerSource {
    fn id(&self) -> &str {
        &self.spec.id
    }

    #[instrument(name = "ExchangerFetch", skip(self, client), fields(exchanger = %self.spec.id))]
    async fn fetch_samples(&self, client: &reqwest::Client) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();

        let Some(parser) = self.parser.as_deref() else {
            warn!(parser = ?self.spec.parser, "No rates parser for exchanger, skipping");
            return outcome;
        };

        let body = match fetch_json(client, &self.spec.id, &self.spec.id, &self.spec.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Skipping exchanger");
                outcome.errors.push(e);
                return outcome;
            }
        };

        let parsed = match parser.parse_rates(&body) {
            Ok(parsed) => parsed,
            Err(message) => {
                let e = SourceError::Parse {
                    source_id: self.spec.id.clone(),
                    target: self.spec.id.clone(),
                    message,
                };
                error!("Error occurred while fetching data for {}: {}", self.spec.id, e);
                outcome.errors.push(e);
                return outcome;
            }
        };

        if !parsed.skipped.is_empty() {
            warn!(skipped = ?parsed.skipped, "Ignoring unusable rate entries");
        }

        outcome.samples = parsed
            .rates
            .into_iter()
            .map(|(code, raw)| RateSample {
                source_id: self.spec.id.clone(),
                raw_symbol: code.clone(),
                currency: code,
                price: 1.0 / raw,
            })
            .collect();
        debug!(count = outcome.samples.len(), "Loaded fiat rates");

        outcome
    }
}
