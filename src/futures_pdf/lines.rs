//! Line classification for extracted futures-screener pages.
//!
//! A page of the screener export flattens into text lines of three kinds:
//! layout noise (headers, footers, filter captions), financial rows (the
//! numeric columns of one token) and text lines (names and tickers).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Substrings (lowercase) marking header/footer/caption lines
const NOISE_KEYWORDS: &[&str] = &[
    "page",
    "coinalyze",
    "contract",
    "filter",
    "column",
    "mkt cap",
    "vol 24h",
    "vtmr",
    "coins",
    "all contracts",
    "custom metrics",
    "watchlists",
];

/// Market cap, volume, optional OI change, optional funding rate, VTMR.
static FINANCIAL_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(\$?[+-]?[\d,.]+[kKmMbB]?)\s+",
        r"(\$?[+-]?[\d,.]+[kKmMbB]?)\s+",
        r"(?:([+-]?[\d.,]+%?|[-–—]|N/A)\s+)?",
        r"(?:([+-]?[\d.,]+%?|[-–—]|N/A)\s+)?",
        r"(\d*\.?\d+)",
    ))
    .unwrap()
});

/// Numeric columns of one screener row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRow {
    /// Magnitude string with `$` and `,` removed, e.g. `"1.5B"`
    pub market_cap: String,
    pub volume: String,
    pub oi_change: Option<String>,
    pub funding_rate: Option<String>,
    pub vtmr: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    Noise,
    Financial(FinancialRow),
    /// Name or ticker candidate
    Text(String),
    /// Purely numeric or single-character leftovers
    Skipped,
}

/// Financial rows and text lines of one page, in reading order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLines {
    pub financials: Vec<FinancialRow>,
    pub text_lines: Vec<String>,
}

pub fn is_noise(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn strip_magnitude(raw: &str) -> String {
    raw.chars().filter(|c| *c != '$' && *c != ',').collect()
}

/// Match a financial row anywhere in the line.
///
/// Returns `None` when the pattern does not match or the VTMR column is not a
/// valid number.
pub fn parse_financial_row(line: &str) -> Option<FinancialRow> {
    let caps = FINANCIAL_ROW.captures(line)?;
    let vtmr = caps.get(5)?.as_str().parse::<f64>().ok()?;

    Some(FinancialRow {
        market_cap: strip_magnitude(caps.get(1)?.as_str()),
        volume: strip_magnitude(caps.get(2)?.as_str()),
        oi_change: caps.get(3).map(|m| m.as_str().to_string()),
        funding_rate: caps.get(4).map(|m| m.as_str().to_string()),
        vtmr,
    })
}

pub fn classify_line(line: &str) -> LineClass {
    if is_noise(line) {
        return LineClass::Noise;
    }
    if let Some(row) = parse_financial_row(line) {
        return LineClass::Financial(row);
    }

    let all_digits = !line.is_empty() && line.chars().all(|c| c.is_numeric());
    if all_digits || line.chars().count() <= 1 {
        LineClass::Skipped
    } else {
        LineClass::Text(line.to_string())
    }
}

/// Split a page's trimmed, non-empty lines into financial rows and text lines.
pub fn classify_page<S: AsRef<str>>(lines: &[S]) -> PageLines {
    let mut page = PageLines::default();
    for line in lines {
        match classify_line(line.as_ref()) {
            LineClass::Financial(row) => page.financials.push(row),
            LineClass::Text(text) => page.text_lines.push(text),
            LineClass::Noise | LineClass::Skipped => {}
        }
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_footer_is_noise() {
        assert_eq!(classify_line("Page 3 of 10"), LineClass::Noise);
        assert_eq!(classify_line("Coinalyze - Custom Metrics"), LineClass::Noise);
        assert_eq!(classify_line("MKT CAP VOL 24H OI CHG FR VTMR"), LineClass::Noise);
    }

    #[test]
    fn test_full_financial_row() {
        let row = parse_financial_row("$1,234.5M $2.3B +25.4% 0.01% 1.53").unwrap();
        assert_eq!(row.market_cap, "1234.5M");
        assert_eq!(row.volume, "2.3B");
        assert_eq!(row.oi_change.as_deref(), Some("+25.4%"));
        assert_eq!(row.funding_rate.as_deref(), Some("0.01%"));
        assert_eq!(row.vtmr, 1.53);
    }

    #[test]
    fn test_financial_row_without_optional_columns() {
        let row = parse_financial_row("$850.2M $1.1B 1.29").unwrap();
        assert_eq!(row.market_cap, "850.2M");
        assert_eq!(row.volume, "1.1B");
        assert_eq!(row.oi_change, None);
        assert_eq!(row.funding_rate, None);
        assert_eq!(row.vtmr, 1.29);
    }

    #[test]
    fn test_financial_row_with_dash_placeholders() {
        let row = parse_financial_row("$12.5M $40.1M – N/A 3.2").unwrap();
        assert_eq!(row.oi_change.as_deref(), Some("–"));
        assert_eq!(row.funding_rate.as_deref(), Some("N/A"));
        assert_eq!(row.vtmr, 3.2);
    }

    #[test]
    fn test_text_and_skipped_lines() {
        assert_eq!(classify_line("Bitcoin"), LineClass::Text("Bitcoin".to_string()));
        assert_eq!(classify_line("BTC"), LineClass::Text("BTC".to_string()));
        assert_eq!(classify_line("42"), LineClass::Skipped);
        assert_eq!(classify_line("x"), LineClass::Skipped);
    }

    #[test]
    fn test_classify_page_keeps_order() {
        let lines = [
            "Coinalyze",
            "Bitcoin",
            "BTC",
            "$1,200B $30.5B +2% 0.01% 0.03",
            "Ethereum",
            "ETH",
            "$400B $20B -1% 0.005% 0.05",
            "Page 1 of 4",
            "7",
        ];
        let page = classify_page(&lines);
        assert_eq!(page.text_lines, vec!["Bitcoin", "BTC", "Ethereum", "ETH"]);
        assert_eq!(page.financials.len(), 2);
        assert_eq!(page.financials[1].market_cap, "400B");
    }
}
