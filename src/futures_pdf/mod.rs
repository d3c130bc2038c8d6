//! Futures Screener PDF Import
//!
//! Rebuilds the futures table from a PDF export of a derivatives screener
//! (Coinalyze "VTMR" custom-metric view). Text extraction flattens the table
//! into lines, so each page goes through three passes:
//! 1. classify lines into noise, financial rows and name/ticker text
//! 2. pair names with tickers
//! 3. zip the pairs with the financial rows by position

pub mod lines;
pub mod pairing;
pub mod signals;

use crate::error::{AppError, Result};
use lines::classify_page;
use pairing::{clean_ticker, pair_names_and_tickers, reconcile};
use serde::{Deserialize, Serialize};
use signals::{FundingReading, OiSignal};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;

/// PDF magic bytes
pub const PDF_MAGIC: &[u8] = b"%PDF";
/// Maximum PDF file size (100 MB)
pub const MAX_PDF_SIZE: usize = 100 * 1024 * 1024;
/// Separator between pages in the extractor's output
pub const PAGE_SEPARATOR: char = '\x0c';

const EXTRACTOR_NAME: &str = "pdf_extractor";

/// One row of the reconstructed futures table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesTokenRecord {
    /// Uppercase alphanumeric, 2-12 characters
    pub ticker: String,
    pub name: String,
    /// As printed, without `$` and `,` (e.g. `"1.5B"`)
    pub market_cap: String,
    pub volume: String,
    pub vtmr: f64,
    pub oiss: Option<OiSignal>,
    pub funding: FundingReading,
}

/// Basic sanity checks before handing bytes to the PDF parser
pub fn validate_pdf(bytes: &[u8]) -> std::result::Result<(), String> {
    if bytes.len() < 8 {
        return Err("File too small to be a valid PDF".to_string());
    }

    if bytes.len() > MAX_PDF_SIZE {
        return Err(format!(
            "PDF file too large ({} MB). Maximum: {} MB",
            bytes.len() / (1024 * 1024),
            MAX_PDF_SIZE / (1024 * 1024)
        ));
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err("Invalid PDF file: missing PDF header".to_string());
    }

    Ok(())
}

/// Parse the text of one page
pub fn parse_page(text: &str) -> Vec<FuturesTokenRecord> {
    let page_lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let classified = classify_page(&page_lines);
    let pairs = pair_names_and_tickers(&classified.text_lines);

    reconcile(pairs, classified.financials)
        .into_iter()
        .map(|(pair, row)| FuturesTokenRecord {
            ticker: pair.ticker,
            name: pair.name,
            market_cap: row.market_cap,
            volume: row.volume,
            vtmr: row.vtmr,
            oiss: row.oi_change.as_deref().and_then(OiSignal::parse),
            funding: FundingReading::parse(row.funding_rate.as_deref()),
        })
        .collect()
}

/// Parse all pages; a page whose parsing panics is logged and skipped.
pub fn parse_pages<S: AsRef<str>>(pages: &[S]) -> Vec<FuturesTokenRecord> {
    let mut tokens = Vec::new();

    for (index, page) in pages.iter().enumerate() {
        let text = page.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| parse_page(text))) {
            Ok(page_tokens) => tokens.extend(page_tokens),
            Err(_) => log::error!("Futures PDF: page {} could not be parsed, skipping", index + 1),
        }
    }

    for token in &mut tokens {
        token.ticker = clean_ticker(&token.ticker);
    }
    tokens.retain(|t| t.ticker.len() > 1);
    tokens
}

/// Extract per-page text in this process, isolating extractor panics.
pub fn extract_page_texts_in_process(bytes: &[u8]) -> Result<Vec<String>> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(AppError::Parse(format!("Failed to extract text from PDF: {}", e))),
        Err(_) => Err(AppError::Parse("PDF extractor crashed on this file".to_string())),
    }
}

/// The helper binary, if it was installed next to the running executable
fn extractor_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe
        .parent()?
        .join(format!("{}{}", EXTRACTOR_NAME, std::env::consts::EXE_SUFFIX));
    candidate.is_file().then_some(candidate)
}

fn extract_via_subprocess(extractor: &Path, pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new(extractor)
        .arg(pdf_path)
        .output()
        .map_err(|e| AppError::Io(format!("Failed to run {}: {}", EXTRACTOR_NAME, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Parse(format!(
            "{} failed ({}): {}",
            EXTRACTOR_NAME,
            output.status,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.split(PAGE_SEPARATOR).map(str::to_string).collect())
}

/// Text of every page of the PDF at `path`
pub fn extract_page_texts(path: &Path) -> Result<Vec<String>> {
    if let Some(extractor) = extractor_binary() {
        log::debug!("Futures PDF: extracting via {}", extractor.display());
        return extract_via_subprocess(&extractor, path);
    }

    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Io(format!("Failed to read PDF file: {}", e)))?;
    validate_pdf(&bytes).map_err(AppError::InvalidInput)?;
    extract_page_texts_in_process(&bytes)
}

/// Reconstruct the futures table from a screener PDF.
///
/// Never fails: a file that cannot be read or extracted yields no tokens.
pub fn extract_futures_tokens(path: &Path) -> Vec<FuturesTokenRecord> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!("Futures PDF: parsing {}", name);

    let pages = match extract_page_texts(path) {
        Ok(pages) => pages,
        Err(e) => {
            log::error!("Futures PDF: {}", e);
            return Vec::new();
        }
    };

    let tokens = parse_pages(&pages);
    log::info!("Futures PDF: {} valid futures tokens from {} pages", tokens.len(), pages.len());
    tokens
}

/// Parse a screener magnitude such as `"$1.5B"`, `"850.2M"` or `"12,345"`.
pub fn parse_magnitude(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last()?.to_ascii_uppercase() {
        'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'B' => (&cleaned[..cleaned.len() - 1], 1e9),
        'T' => (&cleaned[..cleaned.len() - 1], 1e12),
        _ => (cleaned.as_str(), 1.0),
    };

    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
}
