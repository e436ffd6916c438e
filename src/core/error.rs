//! Error types for rate fetching, conversion and configuration.

use thiserror::Error;

/// Failure of a single source or symbol during a fetch cycle.
///
/// These never escape the refresher: they are logged and the affected
/// sample is dropped from aggregation.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure or timeout while talking to the source.
    #[error("Request to {source_id} failed for {target}: {message}")]
    Request {
        source_id: String,
        target: String,
        message: String,
    },

    /// The source answered with a non-success status.
    #[error("Non-ok response from {source_id} for {target}: {status}")]
    Status {
        source_id: String,
        target: String,
        status: u16,
    },

    /// The body did not match the expected schema.
    #[error("Failed to parse response from {source_id} for {target}: {message}")]
    Parse {
        source_id: String,
        target: String,
        message: String,
    },
}

/// Errors surfaced to callers of [`crate::core::convert::ConversionEngine`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Amount was zero, negative or not a finite number.
    #[error("Amount must be greater than 0, got {0}")]
    InvalidAmount(f64),

    /// Code is absent from both rate tables.
    #[error("Currency {0} not found")]
    CurrencyNotFound(String),

    /// Code is known but no source produced a usable rate in the last cycle.
    #[error("Rate for {0} is currently unavailable")]
    RateUnavailable(String),

    /// Target rate resolved to zero.
    #[error("Rate for {0} resolved to zero")]
    ZeroRate(String),

    /// The USDT rate crypto prices are quoted against is missing or unusable.
    #[error("Anchor rate {0} is not available")]
    AnchorUnavailable(String),

    /// The converted amount does not fit in an f64.
    #[error("Converting {from} to {to} overflowed")]
    Overflow { from: String, to: String },
}

impl ConversionError {
    /// Whether the failure is caused by the request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        match self {
            ConversionError::InvalidAmount(_)
            | ConversionError::CurrencyNotFound(_)
            | ConversionError::RateUnavailable(_) => true,
            ConversionError::ZeroRate(_)
            | ConversionError::AnchorUnavailable(_)
            | ConversionError::Overflow { .. } => false,
        }
    }
}

/// Startup configuration errors. Any of these prevents the service from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config not loaded or empty. Check configuration file or environment variables.")]
    Empty,

    #[error("Platform {0} has an invalid url template: missing {{symbol}} placeholder")]
    InvalidUrl(String),

    #[error("Invalid {name}: must be greater than 0")]
    InvalidInterval { name: &'static str },
}
