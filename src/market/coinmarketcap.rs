//! CoinMarketCap Market Provider
//!
//! `/v1/cryptocurrency/listings/latest`, ten pages of 100 listings.
//! Requires an API key (`X-CMC_PRO_API_KEY`).

use super::{flexible_f64, make_record, send_with_retry, MarketSource, RawTokenRecord};
use crate::config::FetchSettings;
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1";
const PAGE_SIZE: u32 = 100;
const MAX_START: u32 = 1001;

#[derive(Debug, Deserialize)]
pub struct ListingsResponse {
    #[serde(default)]
    pub data: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub quote: HashMap<String, UsdQuote>,
}

#[derive(Debug, Deserialize)]
pub struct UsdQuote {
    #[serde(default, deserialize_with = "flexible_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub volume_24h: Option<f64>,
}

pub fn records_from_listings(response: &ListingsResponse, prefilter: f64) -> Vec<RawTokenRecord> {
    response
        .data
        .iter()
        .filter_map(|listing| {
            let usd = listing.quote.get("USD")?;
            make_record(
                &listing.symbol,
                usd.market_cap,
                usd.volume_24h,
                MarketSource::CoinMarketCap,
                prefilter,
            )
        })
        .collect()
}

pub async fn fetch_listings(
    client: &Client,
    api_key: &str,
    settings: &FetchSettings,
    prefilter: f64,
) -> Result<Vec<RawTokenRecord>> {
    let mut records = Vec::new();

    for start in (1..MAX_START).step_by(PAGE_SIZE as usize) {
        let url = format!(
            "{}/cryptocurrency/listings/latest?start={}&limit={}&convert=USD",
            BASE_URL, start, PAGE_SIZE
        );

        let response = send_with_retry(
            || {
                client
                    .get(&url)
                    .header("Accept", "application/json")
                    .header("X-CMC_PRO_API_KEY", api_key)
            },
            settings,
        )
        .await;

        let page_result = match response {
            Ok(r) => r.json::<ListingsResponse>().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        match page_result {
            Ok(listings) => {
                if listings.data.is_empty() {
                    break;
                }
                records.extend(records_from_listings(&listings, prefilter));
            }
            Err(e) => log::warn!("CoinMarketCap: page starting at {} failed: {}", start, e),
        }

        tokio::time::sleep(Duration::from_millis(settings.page_delay_ms)).await;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_from_listings() {
        let json = r#"{
            "status": {"error_code": 0},
            "data": [
                {"symbol": "BTC", "quote": {"USD": {"market_cap": 1.2e12, "volume_24h": 3.1e10}}},
                {"symbol": "wif", "quote": {"USD": {"market_cap": 2.0e9, "volume_24h": 2.6e9}}},
                {"symbol": "NOUSD", "quote": {"EUR": {"market_cap": 1.0, "volume_24h": 9.0}}},
                {"symbol": "FDUSD", "quote": {"USD": {"market_cap": 1.0e9, "volume_24h": 9.0e9}}}
            ]
        }"#;
        let response: ListingsResponse = serde_json::from_str(json).unwrap();
        let records = records_from_listings(&response, 0.75);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "WIF");
        assert_eq!(records[0].volume_24h, 2.6e9);
        assert_eq!(records[0].source, MarketSource::CoinMarketCap);
    }

    #[test]
    fn test_page_starts() {
        let starts: Vec<u32> = (1..MAX_START).step_by(PAGE_SIZE as usize).collect();
        assert_eq!(starts.len(), 10);
        assert_eq!(starts.first(), Some(&1));
        assert_eq!(starts.last(), Some(&901));
    }
}
