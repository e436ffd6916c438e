use std::fs;
use std::time::Duration;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xrate::core::rates::Rate;
use xrate::service::refresh_once;
use xrate::{AppCommand, AppConfig, ConversionError, RatesService};

mod test_utils {
    use super::*;

    async fn mount(server: &MockServer, url_path: &str, symbol: Option<&str>, status: u16, body: &str) {
        let mock = Mock::given(method("GET")).and(path(url_path));
        let mock = match symbol {
            Some(symbol) => mock.and(query_param("symbol", symbol)),
            None => mock,
        };
        mock.respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    /// One server impersonating every source kind.
    pub async fn create_sources_server() -> MockServer {
        let server = MockServer::start().await;

        // Binance style
        mount(&server, "/binance/price", Some("BTCUSDT"), 200, r#"{"symbol":"BTCUSDT","price":"50000.00"}"#).await;
        mount(&server, "/binance/price", Some("ETHUSDT"), 200, r#"{"symbol":"ETHUSDT","price":"3000.00"}"#).await;
        mount(&server, "/binance/price", Some("TONUSDT"), 500, "").await;

        // Bybit style
        mount(
            &server,
            "/bybit/tickers",
            Some("BTCUSDT"),
            200,
            r#"{"retCode":0,"result":{"list":[{"symbol":"BTCUSDT","lastPrice":"50010.00"}]}}"#,
        )
        .await;
        mount(&server, "/bybit/tickers", Some("TONUSDT"), 200, r#"{"retCode":10001,"result":{}}"#).await;

        // Bitfinex style
        mount(
            &server,
            "/bitfinex/ticker/tUSTUSD",
            None,
            200,
            "[0.9999,100,1.0001,100,0,0,1.0,1000,1.001,0.999]",
        )
        .await;

        // Solarpath style
        mount(&server, "/solarpath/quote", Some("ETH"), 200, r#"{"result":{"priceUsd":3010.0}}"#).await;

        // Openexchange style
        mount(
            &server,
            "/fiat/latest.json",
            None,
            200,
            r#"{"base":"USD","rates":{"USD":1,"EUR":0.9,"RUB":90}}"#,
        )
        .await;

        server
    }

    pub fn config_yaml(base: &str) -> String {
        format!(
            r#"
request_timeout_secs: 5
platforms:
  Binance:
    url: "{base}/binance/price?symbol={{symbol}}"
    symbols: [BTCUSDT, ETHUSDT, TONUSDT]
  Bybit:
    url: "{base}/bybit/tickers?category=spot&symbol={{symbol}}"
    symbols: [BTCUSDT, TONUSDT]
  BitFinex:
    url: "{base}/bitfinex/ticker/t{{symbol}}"
    symbols: [USTUSD]
  Solarpath:
    url: "{base}/solarpath/quote?symbol={{symbol}}"
    symbols: [ETH]
exchangers:
  Openexchange:
    url: "{base}/fiat/latest.json"
  Unknown:
    url: "{base}/fiat/unknown.json"
symbols:
  BTCUSDT: BTC
  ETHUSDT: ETH
  TONUSDT: TON
  USTUSD: USDT
"#
        )
    }
}

#[test_log::test(tokio::test)]
async fn test_full_cycle_against_mock_sources() {
    let server = test_utils::create_sources_server().await;
    let config = AppConfig::from_yaml(&test_utils::config_yaml(&server.uri())).unwrap();

    let (engine, report) = refresh_once(&config).await.unwrap();
    info!(?report, "Cycle finished");

    assert_eq!(report.generation, 1);
    // TONUSDT fails on both platforms
    assert_eq!(report.failures, 2);
    assert_eq!(report.crypto_unavailable, 1);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.crypto.get("BTC"), Some(Rate::Available(50005.0)));
    assert_eq!(snapshot.crypto.get("ETH"), Some(Rate::Available(3005.0)));
    assert_eq!(snapshot.crypto.get("USDT"), Some(Rate::Available(1.0)));
    assert_eq!(snapshot.crypto.get("TON"), Some(Rate::Unavailable));
    assert_eq!(snapshot.crypto.get("TON").unwrap().legacy_value(), -1.0);
    assert_eq!(snapshot.fiat.get("EUR"), Some(Rate::Available(1.111111)));
    assert_eq!(snapshot.fiat.get("RUB"), Some(Rate::Available(0.011111)));

    assert_eq!(engine.convert("BTC", "USDT", 1.0).unwrap(), 50005.0);
    let eur = engine.convert("USDT", "EUR", 100.0).unwrap();
    assert!((eur - 90.0).abs() < 1e-4, "got {eur}");
    assert_eq!(engine.convert("EUR", "EUR", 7.0).unwrap(), 7.0);

    assert_eq!(
        engine.convert("TON", "USD", 1.0),
        Err(ConversionError::RateUnavailable("TON".to_string()))
    );
    assert_eq!(
        engine.convert("DOGE", "USD", 1.0),
        Err(ConversionError::CurrencyNotFound("DOGE".to_string()))
    );

    // The exchanger without a known schema is never queried
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/fiat/unknown.json"));
}

#[test_log::test(tokio::test)]
async fn test_legacy_policy_uses_sentinel() {
    let server = test_utils::create_sources_server().await;
    let yaml = format!(
        "sentinel_policy: legacy\n{}",
        test_utils::config_yaml(&server.uri())
    );
    let config = AppConfig::from_yaml(&yaml).unwrap();

    let (engine, _) = refresh_once(&config).await.unwrap();
    assert_eq!(engine.convert("TON", "USD", 2.0).unwrap(), -2.0);
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let server = test_utils::create_sources_server().await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(config_path, test_utils::config_yaml(&server.uri()))
        .expect("Failed to write config file");

    let result = xrate::run_command(
        AppCommand::Convert {
            from: "btc".to_string(),
            to: "eur".to_string(),
            value: 0.5,
            json: true,
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Convert command failed with: {:?}",
        result.err()
    );

    let result = xrate::run_command(
        AppCommand::Rates { json: false },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Rates command failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_app_flow_reports_client_errors() {
    let server = test_utils::create_sources_server().await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(config_path, test_utils::config_yaml(&server.uri()))
        .expect("Failed to write config file");

    let err = xrate::run_command(
        AppCommand::Convert {
            from: "XYZ".to_string(),
            to: "USD".to_string(),
            value: 1.0,
            json: false,
        },
        Some(config_path.to_str().unwrap()),
    )
    .await
    .unwrap_err();
    let conversion = err
        .downcast_ref::<ConversionError>()
        .expect("expected a conversion error");
    assert_eq!(conversion, &ConversionError::CurrencyNotFound("XYZ".to_string()));
    assert!(conversion.is_client_error());

    let err = xrate::run_command(
        AppCommand::Convert {
            from: "BTC".to_string(),
            to: "USD".to_string(),
            value: 0.0,
            json: false,
        },
        Some(config_path.to_str().unwrap()),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConversionError>(),
        Some(&ConversionError::InvalidAmount(0.0))
    );
    // Invalid amounts are rejected before any source is queried
    assert_eq!(server.received_requests().await.unwrap().len(), 8);
}

#[test_log::test(tokio::test)]
async fn test_missing_config_fails() {
    let result = xrate::run_command(AppCommand::Rates { json: true }, Some("/nonexistent/xrate.yaml")).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test_log::test(tokio::test)]
async fn test_service_refreshes_in_background_and_stops() {
    let server = test_utils::create_sources_server().await;
    let yaml = format!(
        "refresh_interval_secs: 1\n{}",
        test_utils::config_yaml(&server.uri())
    );
    let config = AppConfig::from_yaml(&yaml).unwrap();

    let service = RatesService::start(&config).unwrap();
    tokio::time::timeout(Duration::from_secs(5), service.wait_for_generation(1))
        .await
        .expect("first cycle did not complete");

    assert_eq!(service.convert("BTC", "USDT", 2.0).unwrap(), 100010.0);
    assert!(service.snapshot().generation >= 1);

    tokio::time::timeout(Duration::from_secs(5), service.shutdown())
        .await
        .expect("service did not stop")
        .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_unmapped_symbol_stays_listed_when_its_source_fails() {
    // Nothing mounted, every request gets a 404
    let server = MockServer::start().await;
    let yaml = format!(
        r#"
platforms:
  Solarpath:
    url: "{}/solarpath/quote?symbol={{symbol}}"
    symbols: [ETH]
"#,
        server.uri()
    );
    let config = AppConfig::from_yaml(&yaml).unwrap();

    let (engine, report) = refresh_once(&config).await.unwrap();
    assert_eq!(report.failures, 1);
    assert_eq!(report.crypto_unavailable, 1);
    assert_eq!(engine.snapshot().crypto.get("ETH"), Some(Rate::Unavailable));
    assert_eq!(
        engine.convert("ETH", "USD", 1.0),
        Err(ConversionError::RateUnavailable("ETH".to_string()))
    );
}

#[test_log::test(tokio::test)]
async fn test_missing_anchor_is_a_server_error() {
    let server = test_utils::create_sources_server().await;
    let yaml = format!(
        r#"
platforms:
  Binance:
    url: "{base}/binance/price?symbol={{symbol}}"
    symbols: [BTCUSDT]
exchangers:
  Openexchange:
    url: "{base}/fiat/latest.json"
symbols:
  BTCUSDT: BTC
"#,
        base = server.uri()
    );
    let config = AppConfig::from_yaml(&yaml).unwrap();

    let (engine, _) = refresh_once(&config).await.unwrap();
    let err = engine.convert("BTC", "EUR", 1.0).unwrap_err();
    assert_eq!(err, ConversionError::AnchorUnavailable("USDT".to_string()));
    assert!(!err.is_client_error());
    // Fiat-only conversions still work
    let eur = engine.convert("USD", "EUR", 9.0).unwrap();
    assert!((eur - 8.1).abs() < 1e-4, "got {eur}");
}
