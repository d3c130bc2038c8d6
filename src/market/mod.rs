//! Market Data Provider Framework
//!
//! Spot statistics (market cap, 24h volume) from independent providers:
//! - CoinGecko (public API, optional demo/pro key)
//! - CoinMarketCap (API key required)
//! - LiveCoinWatch (API key required)
//! - CoinRanking (API key required)
//!
//! Every provider pre-filters at the source so that only tokens whose volume
//! already exceeds the configured share of their market cap are returned.

pub mod coingecko;
pub mod coinmarketcap;
pub mod coinranking;
pub mod livecoinwatch;

use crate::config::{AppConfig, FetchSettings};
use crate::verify::{FetchFuture, TokenSource};
use anyhow::{anyhow, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Stablecoins and wrapped assets whose volume says nothing about demand
pub const STABLECOINS: &[&str] = &[
    "USDT", "USDC", "BUSD", "DAI", "BSC-USD", "USD1", "CBBTC", "WBNB", "WETH", "UST", "TUSD",
    "USDP", "USDD", "FRAX", "GUSD", "LUSD", "FDUSD",
];

/// HTTP status codes worth another attempt
const RETRYABLE_STATUS: &[u16] = &[429, 500, 502, 503, 504];

const USER_AGENT: &str = concat!("crypto-vat/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSource {
    CoinGecko,
    CoinMarketCap,
    LiveCoinWatch,
    CoinRanking,
}

impl MarketSource {
    pub const ALL: [MarketSource; 4] = [
        Self::CoinGecko,
        Self::CoinMarketCap,
        Self::LiveCoinWatch,
        Self::CoinRanking,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CG" | "COINGECKO" => Some(Self::CoinGecko),
            "CMC" | "COINMARKETCAP" => Some(Self::CoinMarketCap),
            "LCW" | "LIVECOINWATCH" => Some(Self::LiveCoinWatch),
            "CR" | "COINRANKING" | "COINRANKINGS" => Some(Self::CoinRanking),
            _ => None,
        }
    }

    /// Short code used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoinGecko => "CG",
            Self::CoinMarketCap => "CMC",
            Self::LiveCoinWatch => "LCW",
            Self::CoinRanking => "CR",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CoinGecko => "CoinGecko",
            Self::CoinMarketCap => "CoinMarketCap",
            Self::LiveCoinWatch => "LiveCoinWatch",
            Self::CoinRanking => "CoinRanking",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::CoinGecko)
    }
}

/// One provider's view of one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenRecord {
    pub symbol: String,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub source: MarketSource,
}

pub fn is_stablecoin(symbol: &str) -> bool {
    STABLECOINS.contains(&symbol)
}

/// Build a record if the token passes the source-side filter.
///
/// The symbol is normalized to uppercase; stablecoins, non-positive market
/// caps and tokens with `volume <= prefilter * market_cap` are dropped.
pub fn make_record(
    symbol: &str,
    market_cap: Option<f64>,
    volume: Option<f64>,
    source: MarketSource,
    prefilter: f64,
) -> Option<RawTokenRecord> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() || is_stablecoin(&symbol) {
        return None;
    }

    let market_cap = market_cap.filter(|v| v.is_finite())?;
    let volume = volume.filter(|v| v.is_finite()).unwrap_or(0.0);
    if market_cap <= 0.0 || volume <= prefilter * market_cap {
        return None;
    }

    Some(RawTokenRecord {
        symbol,
        market_cap,
        volume_24h: volume,
        source,
    })
}

/// Providers disagree on whether numbers are JSON numbers or strings.
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Shared HTTP client for all providers
pub fn build_client(settings: &FetchSettings) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
        .pool_max_idle_per_host(2)
        .build()?)
}

/// Exponential backoff, capped at 10 seconds
pub fn calculate_backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let delay_ms = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(10_000))
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS.contains(&status)
}

/// Send a request, retrying throttling/server errors and transport failures.
///
/// `build` is called once per attempt because a sent request cannot be reused.
pub async fn send_with_retry<F>(build: F, settings: &FetchSettings) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = anyhow!("No attempts made");

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            tokio::time::sleep(calculate_backoff_delay(settings.retry_base_delay_ms, attempt - 1)).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let body = response.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                last_error = anyhow!("HTTP {} - {}", status, snippet);
                if !is_retryable_status(status.as_u16()) {
                    return Err(last_error);
                }
            }
            Err(e) => {
                last_error = if e.is_timeout() {
                    anyhow!("Request timed out")
                } else if e.is_connect() {
                    anyhow!("Connection failed: {}", e)
                } else {
                    anyhow!(e)
                };
            }
        }
    }

    Err(last_error)
}

/// Fetch the pre-filtered token list of one provider.
///
/// A provider without its required key returns an empty list.
pub async fn fetch_source(
    source: MarketSource,
    client: &Client,
    api_key: Option<&str>,
    settings: &FetchSettings,
    prefilter: f64,
) -> Result<Vec<RawTokenRecord>> {
    if source.requires_api_key() && api_key.is_none() {
        log::warn!("{}: no API key configured, skipping", source.display_name());
        return Ok(Vec::new());
    }

    log::info!("Scanning {}...", source.display_name());
    let records = match source {
        MarketSource::CoinGecko => coingecko::fetch_markets(client, api_key, settings, prefilter).await?,
        MarketSource::CoinMarketCap => {
            coinmarketcap::fetch_listings(client, api_key.unwrap_or_default(), settings, prefilter).await?
        }
        MarketSource::LiveCoinWatch => {
            livecoinwatch::fetch_coins(client, api_key.unwrap_or_default(), settings, prefilter).await?
        }
        MarketSource::CoinRanking => {
            coinranking::fetch_coins(client, api_key.unwrap_or_default(), settings, prefilter).await?
        }
    };
    log::info!("{}: {} tokens", source.display_name(), records.len());

    Ok(records)
}

/// A configured provider, ready to be scheduled by the verifier
#[derive(Debug, Clone)]
pub struct ProviderSource {
    source: MarketSource,
    client: Client,
    api_key: Option<String>,
    settings: FetchSettings,
    prefilter: f64,
}

impl TokenSource for ProviderSource {
    fn source(&self) -> MarketSource {
        self.source
    }

    fn fetch(&self) -> FetchFuture {
        let this = self.clone();
        Box::pin(async move {
            fetch_source(
                this.source,
                &this.client,
                this.api_key.as_deref(),
                &this.settings,
                this.prefilter,
            )
            .await
        })
    }
}

/// All four providers, configured from the app config
pub fn provider_sources(config: &AppConfig) -> Result<Vec<Box<dyn TokenSource>>> {
    let client = build_client(&config.fetch)?;
    let keys = &config.api_keys;

    Ok(MarketSource::ALL
        .iter()
        .map(|&source| {
            let api_key = match source {
                MarketSource::CoinGecko => keys.coingecko(),
                MarketSource::CoinMarketCap => keys.coinmarketcap(),
                MarketSource::LiveCoinWatch => keys.livecoinwatch(),
                MarketSource::CoinRanking => keys.coinranking(),
            };
            Box::new(ProviderSource {
                source,
                client: client.clone(),
                api_key: api_key.map(str::to_string),
                settings: config.fetch.clone(),
                prefilter: config.thresholds.source_prefilter,
            }) as Box<dyn TokenSource>
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_codes() {
        for source in MarketSource::ALL {
            assert_eq!(MarketSource::from_str(source.as_str()), Some(source));
        }
        assert_eq!(MarketSource::from_str("coinrankings"), Some(MarketSource::CoinRanking));
        assert_eq!(MarketSource::from_str("binance"), None);
    }

    #[test]
    fn test_make_record_prefilter() {
        let rec = make_record(" pepe ", Some(100.0), Some(80.0), MarketSource::CoinGecko, 0.75).unwrap();
        assert_eq!(rec.symbol, "PEPE");
        assert_eq!(rec.volume_24h, 80.0);

        // exactly at the threshold is not enough
        assert!(make_record("PEPE", Some(100.0), Some(75.0), MarketSource::CoinGecko, 0.75).is_none());
        assert!(make_record("PEPE", Some(0.0), Some(75.0), MarketSource::CoinGecko, 0.75).is_none());
        assert!(make_record("PEPE", None, Some(75.0), MarketSource::CoinGecko, 0.75).is_none());
        assert!(make_record("PEPE", Some(100.0), None, MarketSource::CoinGecko, 0.75).is_none());
    }

    #[test]
    fn test_make_record_skips_stablecoins() {
        assert!(make_record("usdt", Some(1e9), Some(5e10), MarketSource::CoinMarketCap, 0.75).is_none());
        assert!(make_record("WETH", Some(1e9), Some(5e10), MarketSource::CoinMarketCap, 0.75).is_none());
        assert!(make_record("", Some(1e9), Some(5e10), MarketSource::CoinMarketCap, 0.75).is_none());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(calculate_backoff_delay(500, 0), Duration::from_millis(500));
        assert_eq!(calculate_backoff_delay(500, 2), Duration::from_millis(2000));
        assert_eq!(calculate_backoff_delay(500, 10), Duration::from_millis(10_000));
        assert_eq!(calculate_backoff_delay(500, 200), Duration::from_millis(10_000));
    }

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[derive(Deserialize)]
    struct Flexible {
        #[serde(default, deserialize_with = "flexible_f64")]
        value: Option<f64>,
    }

    #[test]
    fn test_flexible_numbers() {
        let parse = |json: &str| serde_json::from_str::<Flexible>(json).unwrap().value;
        assert_eq!(parse(r#"{"value": 12.5}"#), Some(12.5));
        assert_eq!(parse(r#"{"value": "1234567.89"}"#), Some(1234567.89));
        assert_eq!(parse(r#"{"value": null}"#), None);
        assert_eq!(parse(r#"{"value": "n/a"}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let settings = FetchSettings::default();
        let client = build_client(&settings).unwrap();
        let records = fetch_source(MarketSource::CoinMarketCap, &client, None, &settings, 0.75)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_provider_sources_cover_all_providers() {
        let sources = provider_sources(&AppConfig::default()).unwrap();
        let kinds: Vec<MarketSource> = sources.iter().map(|s| s.source()).collect();
        assert_eq!(kinds, MarketSource::ALL.to_vec());
    }
}
