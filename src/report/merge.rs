//! Cross-market merge of the spot and futures views.
//!
//! Futures rows below the VTMR floor are dropped first; the remaining rows are
//! joined with the spot tokens on the cleaned ticker. The outcome is three
//! disjoint tables: matched, futures-only and spot-only.

use crate::futures_pdf::FuturesTokenRecord;
use crate::verify::VerifiedToken;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Spot side of the merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotToken {
    pub ticker: String,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
    /// Spot VTMR (volume / market cap)
    pub ratio: f64,
}

impl From<VerifiedToken> for SpotToken {
    fn from(token: VerifiedToken) -> Self {
        Self {
            ticker: token.symbol,
            market_cap: Some(token.market_cap),
            volume: Some(token.volume),
            ratio: token.ratio,
        }
    }
}

/// A ticker present on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub spot: SpotToken,
    pub futures: FuturesTokenRecord,
}

impl MatchedRow {
    pub fn ticker(&self) -> &str {
        &self.futures.ticker
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossMarketReport {
    /// Sorted by futures VTMR, descending
    pub matched: Vec<MatchedRow>,
    /// Sorted by VTMR, descending
    pub futures_only: Vec<FuturesTokenRecord>,
    /// Spot ratio >= the floor, sorted by ratio, descending
    pub spot_only: Vec<SpotToken>,
}

impl CrossMarketReport {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.futures_only.is_empty() && self.spot_only.is_empty()
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Keep the first row per key
fn first_per_key<T, F>(items: &[T], key: F) -> Vec<&T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items.iter().filter(|item| seen.insert(key(*item).to_string())).collect()
}

/// Join spot tokens with futures rows.
///
/// Returns `None` when either side is empty: without both views there is no
/// cross-market report to write.
pub fn build_cross_market(
    spot: &[SpotToken],
    futures: &[FuturesTokenRecord],
    min_ratio: f64,
) -> Option<CrossMarketReport> {
    if spot.is_empty() || futures.is_empty() {
        return None;
    }

    let spot = first_per_key(spot, |s| s.ticker.as_str());
    let valid_futures: Vec<&FuturesTokenRecord> = first_per_key(futures, |f| f.ticker.as_str())
        .into_iter()
        .filter(|f| f.vtmr >= min_ratio)
        .collect();

    let mut matched: Vec<MatchedRow> = valid_futures
        .iter()
        .filter_map(|f| {
            spot.iter().find(|s| s.ticker == f.ticker).map(|s| MatchedRow {
                spot: (*s).clone(),
                futures: (*f).clone(),
            })
        })
        .collect();
    matched.sort_by(|a, b| descending(a.futures.vtmr, b.futures.vtmr));

    let matched_tickers: HashSet<&str> = matched.iter().map(|m| m.ticker()).collect();

    let mut futures_only: Vec<FuturesTokenRecord> = valid_futures
        .iter()
        .filter(|f| !matched_tickers.contains(f.ticker.as_str()))
        .map(|f| (*f).clone())
        .collect();
    futures_only.sort_by(|a, b| descending(a.vtmr, b.vtmr));

    let mut spot_only: Vec<SpotToken> = spot
        .iter()
        .filter(|s| !matched_tickers.contains(s.ticker.as_str()) && s.ratio >= min_ratio)
        .map(|s| (*s).clone())
        .collect();
    spot_only.sort_by(|a, b| descending(a.ratio, b.ratio));

    log::info!(
        "Merge: {} matched, {} futures-only, {} spot-only",
        matched.len(),
        futures_only.len(),
        spot_only.len()
    );

    Some(CrossMarketReport {
        matched,
        futures_only,
        spot_only,
    })
}
