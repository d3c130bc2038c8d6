//! Spot volume analysis: verify tokens across providers and write the spot report.

use super::fail;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::events::Progress;
use crate::market::provider_sources;
use crate::report::html::render_spot_report;
use crate::report::{spot_report_file_name, write_atomic};
use crate::scanner::{sanitize_user_id, user_dir};
use crate::verify::{aggregate, run_sources, TokenSource, VerifiedToken};
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SpotOutcome {
    pub tokens: Vec<VerifiedToken>,
    pub report_path: PathBuf,
}

/// Fetch all configured providers and write `{user}_Volumed_Spot_Tokens_*.html`
pub async fn run_spot_analysis(
    config: &AppConfig,
    user: &str,
    progress: &Progress,
) -> Result<SpotOutcome> {
    let sources = match provider_sources(config) {
        Ok(sources) => sources,
        Err(e) => return fail(progress, AppError::Network(e.to_string())),
    };
    run_spot_analysis_with(sources, config, user, progress, Local::now().naive_local()).await
}

/// Same as [`run_spot_analysis`] with explicit sources and timestamp
pub async fn run_spot_analysis_with(
    sources: Vec<Box<dyn TokenSource>>,
    config: &AppConfig,
    user: &str,
    progress: &Progress,
    now: NaiveDateTime,
) -> Result<SpotOutcome> {
    if !config.is_setup_complete() {
        progress.log("CoinMarketCap key missing: verification runs with fewer sources");
    }

    progress.stage(10, "Fetching market data...");
    for source in &sources {
        progress.log(format!("Scanning {}...", source.source().display_name()));
    }
    let records = run_sources(sources, &config.fetch).await;
    progress.log(format!("Total raw results: {}", records.len()));

    progress.stage(30, "Verifying tokens across sources...");
    let tokens = aggregate(records, &config.thresholds);
    progress.log(format!("{} tokens passed verification", tokens.len()));

    progress.stage(50, "Writing spot report...");
    let dir = match user_dir(&config.data_dir, user) {
        Ok(dir) => dir,
        Err(e) => return fail(progress, e),
    };
    let html = render_spot_report(&tokens, now);
    let path = dir.join(spot_report_file_name(&sanitize_user_id(user), now));
    let report_path = match write_atomic(&path, html.as_bytes()) {
        Ok(p) => p,
        Err(e) => return fail(progress, e),
    };

    progress.log(format!("Spot report saved: {}", report_path.display()));
    progress.success("Spot analysis completed");
    Ok(SpotOutcome {
        tokens,
        report_path,
    })
}
