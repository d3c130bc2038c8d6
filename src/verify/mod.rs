//! Multi-source token verification
//!
//! Providers are fetched concurrently through a bounded pool. Each provider
//! gets its own timeout; a provider that fails, times out or panics simply
//! contributes nothing. The surviving records are grouped by symbol and each
//! group is accepted or rejected by a fixed-threshold ratio policy.

use crate::config::{FetchSettings, Thresholds};
use crate::market::{MarketSource, RawTokenRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Future returned by [`TokenSource::fetch`]
pub type FetchFuture = Pin<Box<dyn Future<Output = anyhow::Result<Vec<RawTokenRecord>>> + Send>>;

/// Anything that can produce pre-filtered token records for one provider.
pub trait TokenSource: Send + Sync {
    fn source(&self) -> MarketSource;

    fn fetch(&self) -> FetchFuture;
}

/// A token that passed the cross-source acceptance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedToken {
    pub symbol: String,
    pub market_cap: f64,
    pub volume: f64,
    /// volume / market_cap
    pub ratio: f64,
    pub source_count: usize,
    pub is_large_cap: bool,
}

/// Fetch all sources with at most `settings.workers` in flight.
///
/// Never fails: the result holds whatever the healthy sources returned.
pub async fn run_sources(
    sources: Vec<Box<dyn TokenSource>>,
    settings: &FetchSettings,
) -> Vec<RawTokenRecord> {
    let permits = Arc::new(Semaphore::new(settings.workers.max(1)));
    let budget = Duration::from_secs(settings.source_timeout_secs);
    let mut tasks = JoinSet::new();

    for source in sources {
        let kind = source.source();
        let fetch = source.fetch();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            (kind, tokio::time::timeout(budget, fetch).await)
        });
    }

    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((kind, Ok(Ok(batch)))) => {
                log::info!("Verify: {} returned {} candidates", kind.display_name(), batch.len());
                records.extend(batch);
            }
            Ok((kind, Ok(Err(e)))) => {
                log::warn!("Verify: {} failed: {}", kind.display_name(), e);
            }
            Ok((kind, Err(_))) => {
                log::warn!(
                    "Verify: {} timed out after {}s",
                    kind.display_name(),
                    budget.as_secs()
                );
            }
            Err(e) => {
                log::error!("Verify: source task aborted: {}", e);
            }
        }
    }

    log::info!("Verify: total raw results: {}", records.len());
    records
}

/// Apply the acceptance policy to all records of one symbol.
///
/// Single source: accepted when that source reports a large cap and
/// `ratio >= single_source_min_ratio`. Two or more sources: market cap and
/// volume are averaged and the token is accepted when
/// `ratio > multi_source_min_ratio`.
pub fn evaluate_symbol(
    symbol: &str,
    records: &[RawTokenRecord],
    thresholds: &Thresholds,
) -> Option<VerifiedToken> {
    let is_large_cap = records.iter().any(|r| r.market_cap > thresholds.large_cap);

    match records.len() {
        0 => None,
        1 => {
            let record = &records[0];
            let ratio = safe_ratio(record.volume_24h, record.market_cap);
            (is_large_cap && ratio >= thresholds.single_source_min_ratio).then(|| VerifiedToken {
                symbol: symbol.to_string(),
                market_cap: record.market_cap,
                volume: record.volume_24h,
                ratio,
                source_count: 1,
                is_large_cap: true,
            })
        }
        n => {
            let count = n as f64;
            let market_cap = records.iter().map(|r| r.market_cap).sum::<f64>() / count;
            let volume = records.iter().map(|r| r.volume_24h).sum::<f64>() / count;
            let ratio = safe_ratio(volume, market_cap);
            (ratio > thresholds.multi_source_min_ratio).then(|| VerifiedToken {
                symbol: symbol.to_string(),
                market_cap,
                volume,
                ratio,
                source_count: n,
                is_large_cap,
            })
        }
    }
}

fn safe_ratio(volume: f64, market_cap: f64) -> f64 {
    if market_cap > 0.0 {
        volume / market_cap
    } else {
        0.0
    }
}

/// Group by uppercase symbol, verify, and sort by ratio (descending).
pub fn aggregate(records: Vec<RawTokenRecord>, thresholds: &Thresholds) -> Vec<VerifiedToken> {
    let mut by_symbol: BTreeMap<String, Vec<RawTokenRecord>> = BTreeMap::new();
    for record in records {
        let symbol = record.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        by_symbol.entry(symbol).or_default().push(record);
    }

    let mut verified: Vec<VerifiedToken> = by_symbol
        .iter()
        .filter_map(|(symbol, group)| evaluate_symbol(symbol, group, thresholds))
        .collect();

    verified.sort_by(|a, b| {
        b.ratio
            .total_cmp(&a.ratio)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    verified
}

/// Fetch every source and return the verified tokens.
pub async fn verify_tokens(
    sources: Vec<Box<dyn TokenSource>>,
    settings: &FetchSettings,
    thresholds: &Thresholds,
) -> Vec<VerifiedToken> {
    let records = run_sources(sources, settings).await;
    let verified = aggregate(records, thresholds);
    log::info!("Verify: {} tokens passed verification", verified.len());
    verified
}
