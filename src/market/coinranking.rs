//! CoinRanking Market Provider
//!
//! `/v2/coins` ordered by market cap, ten pages of 100 coins.
//! Requires an API key (`x-access-token`). Numbers arrive as strings.

use super::{flexible_f64, make_record, send_with_retry, MarketSource, RawTokenRecord};
use crate::config::FetchSettings;
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const COINS_URL: &str = "https://api.coinranking.com/v2/coins";
const PAGE_SIZE: u32 = 100;
const MAX_OFFSET: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct CoinsResponse {
    pub data: Option<CoinsData>,
}

#[derive(Debug, Deserialize)]
pub struct CoinsData {
    #[serde(default)]
    pub coins: Vec<CoinEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CoinEntry {
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "marketCap", default, deserialize_with = "flexible_f64")]
    pub market_cap: Option<f64>,
    #[serde(rename = "24hVolume", default, deserialize_with = "flexible_f64")]
    pub volume_24h: Option<f64>,
}

pub fn records_from_response(response: &CoinsResponse, prefilter: f64) -> Vec<RawTokenRecord> {
    let Some(data) = &response.data else {
        return Vec::new();
    };
    data.coins
        .iter()
        .filter_map(|c| {
            make_record(
                &c.symbol,
                c.market_cap,
                c.volume_24h,
                MarketSource::CoinRanking,
                prefilter,
            )
        })
        .collect()
}

/// Query parameters of one page, largest market cap first
pub fn page_query(offset: u32) -> [(&'static str, String); 4] {
    [
        ("limit", PAGE_SIZE.to_string()),
        ("offset", offset.to_string()),
        ("orderBy", "marketCap".to_string()),
        ("orderDirection", "desc".to_string()),
    ]
}

pub async fn fetch_coins(
    client: &Client,
    api_key: &str,
    settings: &FetchSettings,
    prefilter: f64,
) -> Result<Vec<RawTokenRecord>> {
    let mut records = Vec::new();

    for offset in (0..MAX_OFFSET).step_by(PAGE_SIZE as usize) {
        let query = page_query(offset);

        let response = send_with_retry(
            || {
                client
                    .get(COINS_URL)
                    .query(&query)
                    .header("Accept", "application/json")
                    .header("x-access-token", api_key)
            },
            settings,
        )
        .await;

        let page_result = match response {
            Ok(r) => r.json::<CoinsResponse>().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        match page_result {
            Ok(page) => {
                let empty = page.data.as_ref().map_or(true, |d| d.coins.is_empty());
                if empty {
                    break;
                }
                records.extend(records_from_response(&page, prefilter));
            }
            Err(e) => log::warn!("CoinRanking: offset {} failed: {}", offset, e),
        }

        tokio::time::sleep(Duration::from_millis(settings.page_delay_ms)).await;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_numbers_are_parsed() {
        let json = r#"{
            "status": "success",
            "data": {
                "coins": [
                    {"uuid": "Qwsogvtv82FCd", "symbol": "BTC", "marketCap": "1200000000000", "24hVolume": "31000000000"},
                    {"uuid": "x1", "symbol": "Floki", "marketCap": "2100000000", "24hVolume": "3500000000"},
                    {"uuid": "x2", "symbol": "DEAD", "marketCap": null, "24hVolume": "10"}
                ]
            }
        }"#;
        let response: CoinsResponse = serde_json::from_str(json).unwrap();
        let records = records_from_response(&response, 0.75);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "FLOKI");
        assert_eq!(records[0].market_cap, 2_100_000_000.0);
        assert_eq!(records[0].volume_24h, 3_500_000_000.0);
    }

    #[test]
    fn test_page_query() {
        let query = page_query(300);
        assert_eq!(query[0], ("limit", "100".to_string()));
        assert_eq!(query[1], ("offset", "300".to_string()));
        assert_eq!(query[2], ("orderBy", "marketCap".to_string()));
    }

    #[test]
    fn test_missing_data_block() {
        let response: CoinsResponse =
            serde_json::from_str(r#"{"status": "fail", "message": "bad token"}"#).unwrap();
        assert!(records_from_response(&response, 0.75).is_empty());
    }
}
