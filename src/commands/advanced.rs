//! Advanced (cross-market) analysis over today's spot report and futures PDF.

use super::{blocking, fail};
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::Progress;
use crate::futures_pdf::{extract_futures_tokens, FuturesTokenRecord};
use crate::report::html::render_cross_market_report;
use crate::report::merge::{build_cross_market, CrossMarketReport, SpotToken};
use crate::report::pdf::render_cross_market_pdf;
use crate::report::{cross_report_file_name, write_atomic};
use crate::scanner::{cleanup_inputs, find_input_files, user_dir};
use crate::spot_table::load_spot_table;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Table sizes of a written report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub matched: usize,
    pub futures_only: usize,
    pub spot_only: usize,
}

impl From<&CrossMarketReport> for ReportSummary {
    fn from(report: &CrossMarketReport) -> Self {
        Self {
            matched: report.matched.len(),
            futures_only: report.futures_only.len(),
            spot_only: report.spot_only.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvancedOutcome {
    Report {
        html: PathBuf,
        pdf: Option<PathBuf>,
        summary: ReportSummary,
    },
    /// One of the inputs held no usable rows
    NoData,
}

/// Find today's inputs for `user`, merge them and write the report.
///
/// Missing inputs abort with `AppError::MissingInput`. Consumed inputs are
/// deleted once the report is written.
pub async fn run_advanced_analysis(
    config: &AppConfig,
    user: &str,
    progress: &Progress,
) -> Result<AdvancedOutcome> {
    progress.stage(10, "Locating today's input files...");
    let dir = match user_dir(&config.data_dir, user) {
        Ok(dir) => dir,
        Err(e) => return fail(progress, e),
    };

    let inputs = match find_input_files(&dir) {
        Ok(inputs) => inputs,
        Err(e) => return fail(progress, e),
    };
    if inputs.futures.is_none() {
        if let Some(url) = &config.futures_url {
            progress.log(format!(
                "Print the futures table from {} to PDF and add it with `upload-futures`",
                url
            ));
        }
    }
    let (spot_path, futures_path) = match inputs.require_both() {
        Ok(paths) => paths,
        Err(e) => return fail(progress, e),
    };

    let outcome = analyze_files(config, &spot_path, &futures_path, progress).await?;

    if matches!(outcome, AdvancedOutcome::Report { .. }) {
        let removed = cleanup_inputs(&[spot_path.as_path(), futures_path.as_path()]);
        progress.log(format!("Removed {} consumed input files", removed));
    }
    Ok(outcome)
}

/// Merge an explicit spot table and futures PDF
pub async fn analyze_files(
    config: &AppConfig,
    spot_path: &Path,
    futures_path: &Path,
    progress: &Progress,
) -> Result<AdvancedOutcome> {
    progress.stage(50, "Parsing spot report...");
    let spot = match load_spot_table(spot_path) {
        Ok(tokens) => tokens,
        Err(e) => return fail(progress, e),
    };
    progress.log(format!("Spot tokens: {}", spot.len()));

    progress.stage(70, "Parsing futures PDF...");
    let owned_path = futures_path.to_path_buf();
    let futures = match blocking(move || extract_futures_tokens(&owned_path)).await {
        Ok(tokens) => tokens,
        Err(e) => return fail(progress, e),
    };
    progress.log(format!("Futures tokens: {}", futures.len()));

    compile_report(config, &spot, &futures, Local::now().naive_local(), progress)
}

/// Merge both sides and write the HTML (and optionally PDF) report
pub fn compile_report(
    config: &AppConfig,
    spot: &[SpotToken],
    futures: &[FuturesTokenRecord],
    now: NaiveDateTime,
    progress: &Progress,
) -> Result<AdvancedOutcome> {
    progress.stage(90, "Compiling cross-market report...");

    let Some(report) = build_cross_market(spot, futures, config.thresholds.report_min_ratio) else {
        progress.log("No usable data on one side, no report written");
        progress.success("No data to report");
        return Ok(AdvancedOutcome::NoData);
    };

    let html = render_cross_market_report(&report, now);
    let html_path = config.report_dir.join(cross_report_file_name(now, "html"));
    let html_path = match write_atomic(&html_path, html.as_bytes()) {
        Ok(path) => path,
        Err(e) => return fail(progress, e),
    };

    let pdf_path = if config.write_pdf {
        let target = config.report_dir.join(cross_report_file_name(now, "pdf"));
        match render_cross_market_pdf(&report, now).and_then(|bytes| write_atomic(&target, &bytes)) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Report: PDF version skipped: {}", e);
                progress.log(format!("PDF version skipped: {}", e));
                None
            }
        }
    } else {
        None
    };

    let summary = ReportSummary::from(&report);
    progress.log(format!(
        "Report: {} matched, {} futures-only, {} spot-only",
        summary.matched, summary.futures_only, summary.spot_only
    ));
    progress.success("Task Completed Successfully");

    Ok(AdvancedOutcome::Report {
        html: html_path,
        pdf: pdf_path,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::futures_pdf::signals::{FundingReading, OiSignal};
    use chrono::NaiveDate;

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.data_dir = dir.join("data");
        config.report_dir = dir.join("reports");
        config
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 5)
            .unwrap()
            .and_hms_opt(6, 7, 8)
            .unwrap()
    }

    fn btc_spot() -> Vec<SpotToken> {
        vec![SpotToken {
            ticker: "BTC".to_string(),
            market_cap: Some(1e12),
            volume: Some(8e11),
            ratio: 0.8,
        }]
    }

    fn futures() -> Vec<FuturesTokenRecord> {
        vec![
            FuturesTokenRecord {
                ticker: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                market_cap: "1T".to_string(),
                volume: "900B".to_string(),
                vtmr: 0.9,
                oiss: OiSignal::parse("+5%"),
                funding: FundingReading::parse(Some("0.01%")),
            },
            FuturesTokenRecord {
                ticker: "ETH".to_string(),
                name: "Ethereum".to_string(),
                market_cap: "400B".to_string(),
                volume: "120B".to_string(),
                vtmr: 0.3,
                oiss: None,
                funding: FundingReading::Missing,
            },
        ]
    }

    #[test]
    fn test_compile_report_writes_html_and_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let outcome =
            compile_report(&config, &btc_spot(), &futures(), now(), &Progress::disabled()).unwrap();
        match outcome {
            AdvancedOutcome::Report { html, pdf, summary } => {
                assert_eq!(
                    html,
                    dir.path().join("reports").join("2026-04-05_06-07-08-crypto-analysis.html")
                );
                let text = std::fs::read_to_string(&html).unwrap();
                assert!(text.contains("<td>BTC</td>"));
                assert!(!text.contains("ETH"));
                assert!(pdf.unwrap().is_file());
                assert_eq!(
                    summary,
                    ReportSummary {
                        matched: 1,
                        futures_only: 0,
                        spot_only: 0
                    }
                );
            }
            AdvancedOutcome::NoData => panic!("expected a report"),
        }
    }

    #[test]
    fn test_empty_side_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let outcome = compile_report(&config, &[], &futures(), now(), &Progress::disabled()).unwrap();
        assert_eq!(outcome, AdvancedOutcome::NoData);
        assert!(!dir.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_missing_inputs_abort() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let user = user_dir(&config.data_dir, "bob").unwrap();
        std::fs::write(user.join("bob_spot.csv"), "ticker,spot_vtmr\nBTC,0.8\n").unwrap();

        let err = run_advanced_analysis(&config, "bob", &Progress::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingInput(_)));
        // nothing consumed
        assert!(user.join("bob_spot.csv").exists());
    }

    #[tokio::test]
    async fn test_unreadable_futures_pdf_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let user = user_dir(&config.data_dir, "carol").unwrap();
        let spot = user.join("carol_spot.csv");
        let futures = user.join("carol_futures.pdf");
        std::fs::write(&spot, "ticker,spot_vtmr\nBTC,0.8\n").unwrap();
        std::fs::write(&futures, b"%PDF-1.4\nbroken\n%%EOF").unwrap();

        let outcome = run_advanced_analysis(&config, "carol", &Progress::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, AdvancedOutcome::NoData);
        // inputs stay for another attempt
        assert!(spot.exists());
        assert!(futures.exists());
    }

    #[tokio::test]
    async fn test_empty_spot_report_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let user = user_dir(&config.data_dir, "alice").unwrap();

        let spot = user.join("alice_Volumed_Spot_Tokens_Jan-01-26.html");
        let futures = user.join("alice_futures.pdf");
        std::fs::write(&spot, crate::report::html::render_spot_report(&[], now())).unwrap();
        std::fs::write(&futures, b"%PDF-1.4\nbroken\n%%EOF").unwrap();

        let outcome = analyze_files(&config, &spot, &futures, &Progress::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, AdvancedOutcome::NoData);
        assert!(!dir.path().join("reports").exists());
    }
}
