use crate::core::error::SourceError;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("xrate/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by all sources of a refresher.
///
/// `timeout` bounds every request so one unresponsive source cannot stall a cycle.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// GETs `url` and decodes the body as JSON.
///
/// `target` names what is being fetched (a symbol, or the exchanger itself)
/// and ends up in the error for log context.
pub async fn fetch_json(
    client: &reqwest::Client,
    source_id: &str,
    target: &str,
    url: &str,
) -> Result<Value, SourceError> {
    debug!(source = source_id, target, url, "Requesting rates");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::Request {
            source_id: source_id.to_string(),
            target: target.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            source_id: source_id.to_string(),
            target: target.to_string(),
            status: status.as_u16(),
        });
    }

    let text = response.text().await.map_err(|e| SourceError::Request {
        source_id: source_id.to_string(),
        target: target.to_string(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&text).map_err(|e| SourceError::Parse {
        source_id: source_id.to_string(),
        target: target.to_string(),
        message: format!("invalid JSON: {e}"),
    })
}
