//! Price sources polled by the refresher.

pub mod crypto;
pub mod fiat;
pub mod parsers;
pub mod util;

use crate::core::error::SourceError;
use crate::core::rates::RateSample;
use async_trait::async_trait;

pub use crypto::PlatformSource;
pub use fiat::ExchangerSource;

/// Samples and contained failures of one source for one fetch cycle.
#[derive(Debug, Default)]
pub struct SourceOutcome {
    pub samples: Vec<RateSample>,
    pub errors: Vec<SourceError>,
}

#[async_trait]
pub trait RateSource: Send + Sync {
    fn id(&self) -> &str;

    /// Fetches everything this source offers. Never fails as a whole: every
    /// failure is reported in [`SourceOutcome::errors`].
    async fn fetch_samples(&self, client: &reqwest::Client) -> SourceOutcome;
}
