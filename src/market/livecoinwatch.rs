//! LiveCoinWatch Market Provider
//!
//! Single `POST /coins/list` request for the top 1000 coins by rank.
//! Requires an API key (`x-api-key`).

use super::{flexible_f64, make_record, send_with_retry, MarketSource, RawTokenRecord};
use crate::config::FetchSettings;
use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const COINS_LIST_URL: &str = "https://api.livecoinwatch.com/coins/list";
const LIMIT: u32 = 1000;

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    currency: &'a str,
    sort: &'a str,
    order: &'a str,
    offset: u32,
    limit: u32,
    meta: bool,
}

#[derive(Debug, Deserialize)]
pub struct CoinEntry {
    #[serde(default)]
    pub code: String,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub cap: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub volume: Option<f64>,
}

pub fn records_from_coins(coins: &[CoinEntry], prefilter: f64) -> Vec<RawTokenRecord> {
    coins
        .iter()
        .filter_map(|c| make_record(&c.code, c.cap, c.volume, MarketSource::LiveCoinWatch, prefilter))
        .collect()
}

pub async fn fetch_coins(
    client: &Client,
    api_key: &str,
    settings: &FetchSettings,
    prefilter: f64,
) -> Result<Vec<RawTokenRecord>> {
    let body = ListRequest {
        currency: "USD",
        sort: "rank",
        order: "ascending",
        offset: 0,
        limit: LIMIT,
        meta: true,
    };

    let response = send_with_retry(
        || {
            client
                .post(COINS_LIST_URL)
                .header("content-type", "application/json")
                .header("x-api-key", api_key)
                .json(&body)
        },
        settings,
    )
    .await?;

    let coins: Vec<CoinEntry> = response.json().await?;
    Ok(records_from_coins(&coins, prefilter))
}
