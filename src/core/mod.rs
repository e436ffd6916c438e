//! Rate model, aggregation, caching and conversion

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use cache::RateCache;
pub use convert::{ConversionEngine, SentinelPolicy};
pub use error::{ConfigError, ConversionError, SourceError};
pub use rates::{Rate, RateSample, RateSnapshot, RateTable};
