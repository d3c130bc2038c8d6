//! CoinGecko Market Provider
//!
//! Ranked market list from `/coins/markets`, four pages of 250 coins.
//! - Public API: 10-30 calls/minute (no API key)
//! - Demo API: 30 calls/minute (free key, "CG-..." prefix)
//! - Pro API: higher limits (paid)
//!
//! API documentation: https://docs.coingecko.com/

use super::{flexible_f64, make_record, send_with_retry, MarketSource, RawTokenRecord};
use crate::config::FetchSettings;
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Public API (no key required, limited)
const PUBLIC_BASE_URL: &str = "https://api.coingecko.com/api/v3";
/// Pro API (paid)
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

const PAGES: u32 = 4;
const PER_PAGE: u32 = 250;

fn get_base_url(api_key: Option<&str>) -> &'static str {
    match api_key {
        Some(key) if !key.starts_with("CG-") => PRO_BASE_URL,
        _ => PUBLIC_BASE_URL,
    }
}

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
pub struct MarketEntry {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub total_volume: Option<f64>,
}

/// Pre-filtered records from one decoded page
pub fn records_from_page(entries: &[MarketEntry], prefilter: f64) -> Vec<RawTokenRecord> {
    entries
        .iter()
        .filter_map(|e| {
            make_record(
                &e.symbol,
                e.market_cap,
                e.total_volume,
                MarketSource::CoinGecko,
                prefilter,
            )
        })
        .collect()
}

/// Fetch the top 1000 coins by market cap
///
/// # Arguments
/// * `api_key` - Optional API key (Demo: "CG-...", Pro: other)
/// * `prefilter` - keep only volume > prefilter × market cap
pub async fn fetch_markets(
    client: &Client,
    api_key: Option<&str>,
    settings: &FetchSettings,
    prefilter: f64,
) -> Result<Vec<RawTokenRecord>> {
    let base_url = get_base_url(api_key);
    let mut records = Vec::new();

    for page in 1..=PAGES {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}",
            base_url, PER_PAGE, page
        );

        let response = send_with_retry(
            || {
                let mut request = client.get(&url).header("Accept", "application/json");
                if let Some(key) = api_key {
                    if key.starts_with("CG-") {
                        request = request.header("x-cg-demo-api-key", key);
                    } else {
                        request = request.header("x-cg-pro-api-key", key);
                    }
                }
                request
            },
            settings,
        )
        .await;

        let page_result = match response {
            Ok(r) => r.json::<Vec<MarketEntry>>().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        match page_result {
            Ok(entries) => {
                if entries.is_empty() {
                    break;
                }
                records.extend(records_from_page(&entries, prefilter));
            }
            Err(e) => log::warn!("CoinGecko: page {} failed: {}", page, e),
        }

        tokio::time::sleep(Duration::from_millis(settings.page_delay_ms)).await;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"[
        {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "market_cap": 1000000000000, "total_volume": 30000000000},
        {"id": "pepe", "symbol": "pepe", "name": "Pepe", "market_cap": 4000000000, "total_volume": 5200000000.5},
        {"id": "tether", "symbol": "usdt", "name": "Tether", "market_cap": 90000000000, "total_volume": 95000000000},
        {"id": "ghost", "symbol": "ghost", "name": "Ghost", "market_cap": null, "total_volume": 1000}
    ]"#;

    #[test]
    fn test_records_from_page() {
        let entries: Vec<MarketEntry> = serde_json::from_str(PAGE).unwrap();
        let records = records_from_page(&entries, 0.75);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "PEPE");
        assert_eq!(records[0].source, MarketSource::CoinGecko);
        assert_eq!(records[0].market_cap, 4_000_000_000.0);
    }

    #[test]
    fn test_base_url_by_key() {
        assert_eq!(get_base_url(None), PUBLIC_BASE_URL);
        assert_eq!(get_base_url(Some("CG-abc")), PUBLIC_BASE_URL);
        assert_eq!(get_base_url(Some("pro-key")), PRO_BASE_URL);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_markets_live() {
        let settings = FetchSettings::default();
        let client = super::super::build_client(&settings).unwrap();
        let records = fetch_markets(&client, None, &settings, 0.75).await.unwrap();
        assert!(records.iter().all(|r| r.volume_24h > 0.75 * r.market_cap));
    }
}
