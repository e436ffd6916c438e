use crate::core::convert::SentinelPolicy;
use crate::core::error::ConfigError;
use crate::core::rates::CurrencyCode;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV_VAR: &str = "XRATE_CONFIG";

/// Placeholder substituted with the source-native symbol in platform urls.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

/// Response schema understood by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// `{"price": "..."}`
    Price,
    /// `{"result": {"list": [{"lastPrice": "..."}]}}`
    Bybit,
    /// `[..., ..., ..., ..., ..., ..., last_price, ...]`
    Bitfinex,
    /// `{"result": {"priceUsd": ...}}`
    Solarpath,
    /// `{"rates": {"EUR": 0.9, ...}}`
    OpenExchange,
    /// No known schema for this source; it yields no samples.
    #[serde(skip)]
    Unsupported,
}

impl ParserKind {
    /// Picks the schema from a well-known source id.
    pub fn infer(source_id: &str) -> ParserKind {
        match source_id.to_ascii_lowercase().as_str() {
            "binance" => ParserKind::Price,
            "bybit" => ParserKind::Bybit,
            "bitfinex" => ParserKind::Bitfinex,
            "solarpath" => ParserKind::Solarpath,
            "openexchange" | "openexchangerates" => ParserKind::OpenExchange,
            _ => ParserKind::Unsupported,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlatformConfig {
    pub url: String,
    pub symbols: Vec<String>,
    pub parser: Option<ParserKind>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangerConfig {
    pub url: String,
    pub parser: Option<ParserKind>,
}

/// Crypto platform queried once per symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSpec {
    pub id: String,
    pub url_template: String,
    pub symbols: Vec<String>,
    pub parser: ParserKind,
}

impl PlatformSpec {
    pub fn url_for(&self, symbol: &str) -> String {
        self.url_template.replace(SYMBOL_PLACEHOLDER, symbol)
    }
}

/// Fiat exchanger returning a full rates table in one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangerSpec {
    pub id: String,
    pub url: String,
    pub parser: ParserKind,
}

fn default_refresh_interval() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
    #[serde(default)]
    pub exchangers: BTreeMap<String, ExchangerConfig>,
    /// Source-native symbol to canonical currency code.
    #[serde(default)]
    pub symbols: BTreeMap<String, String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sentinel_policy: SentinelPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => {
                debug!("Loading config from {}", CONFIG_ENV_VAR);
                PathBuf::from(path)
            }
            _ => {
                debug!("Loading default config");
                Self::default_config_path()?
            }
        };
        Ok(Self::load_from_path(&config_path)?)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let shown = path.as_ref().display().to_string();
        let config_str = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;

        let config = Self::from_yaml(&config_str).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: shown.clone(),
                source,
            },
            other => other,
        })?;
        debug!(path = %shown, "Successfully loaded config");
        Ok(config)
    }

    /// Parses and validates a YAML document, expanding `${VAR}` placeholders first.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(yaml);
        let config: Self =
            serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platforms.is_empty() && self.exchangers.is_empty() {
            return Err(ConfigError::Empty);
        }
        if let Some((id, _)) = self
            .platforms
            .iter()
            .find(|(_, p)| !p.url.contains(SYMBOL_PLACEHOLDER))
        {
            return Err(ConfigError::InvalidUrl(id.clone()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "refresh_interval_secs",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "request_timeout_secs",
            });
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn platform_specs(&self) -> Vec<PlatformSpec> {
        self.platforms
            .iter()
            .map(|(id, p)| PlatformSpec {
                id: id.clone(),
                url_template: p.url.clone(),
                symbols: p.symbols.clone(),
                parser: p.parser.unwrap_or_else(|| ParserKind::infer(id)),
            })
            .collect()
    }

    pub fn exchanger_specs(&self) -> Vec<ExchangerSpec> {
        self.exchangers
            .iter()
            .map(|(id, e)| ExchangerSpec {
                id: id.clone(),
                url: e.url.clone(),
                parser: e.parser.unwrap_or_else(|| ParserKind::infer(id)),
            })
            .collect()
    }

    /// Every crypto code a cycle should report on, whether or not a source
    /// answers: the symbol map targets plus each platform symbol as mapped.
    pub fn known_crypto(&self) -> BTreeSet<CurrencyCode> {
        self.symbols
            .values()
            .cloned()
            .chain(
                self.platforms
                    .values()
                    .flat_map(|p| p.symbols.iter())
                    .map(|raw| canonical_code(&self.symbols, raw)),
            )
            .collect()
    }
}

/// Canonical code for a source-native symbol, identity when unmapped.
pub fn canonical_code(symbols: &BTreeMap<String, CurrencyCode>, raw: &str) -> CurrencyCode {
    symbols.get(raw).cloned().unwrap_or_else(|| raw.to_string())
}

/// Replaces `${NAME}` with the value of the environment variable `NAME`.
/// Unset variables are left as-is.
fn expand_env(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) => output.push_str(&value),
                    Err(_) => {
                        warn!(variable = name, "Environment variable not set");
                        output.push_str(&rest[start..start + 2 + end + 1]);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}
