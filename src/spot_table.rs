//! Spot report import
//!
//! The advanced analysis reads the spot side from a table file: either a CSV
//! export or an HTML page whose first `<table>` holds the data (the spot report
//! this tool writes qualifies). Column names are matched loosely.

use crate::error::{AppError, Result};
use crate::futures_pdf::pairing::clean_ticker;
use crate::futures_pdf::parse_magnitude;
use crate::report::merge::SpotToken;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<table\b.*?</table>").unwrap());
static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Ticker,
    Ratio,
    MarketCap,
    Volume,
}

fn map_header(header: &str) -> Option<Column> {
    match header {
        "ticker" | "symbol" => Some(Column::Ticker),
        "spot_vtmr" | "flipping_multiple" | "vtmr" => Some(Column::Ratio),
        "market_cap" | "marketcap" => Some(Column::MarketCap),
        "volume_24h" | "volume" => Some(Column::Volume),
        _ => None,
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Column index per role; the first matching header wins.
#[derive(Debug, Default)]
struct ColumnLayout {
    ticker: Option<usize>,
    ratio: Option<usize>,
    market_cap: Option<usize>,
    volume: Option<usize>,
}

impl ColumnLayout {
    fn from_headers(headers: &[String]) -> Self {
        let mut layout = Self::default();
        for (index, header) in headers.iter().enumerate() {
            let slot = match map_header(header) {
                Some(Column::Ticker) => &mut layout.ticker,
                Some(Column::Ratio) => &mut layout.ratio,
                Some(Column::MarketCap) => &mut layout.market_cap,
                Some(Column::Volume) => &mut layout.volume,
                None => continue,
            };
            slot.get_or_insert(index);
        }

        if layout.ticker.is_none() {
            layout.ticker = headers
                .iter()
                .position(|h| h.contains("sym") || h.contains("tick") || h.contains("tok"));
        }
        layout
    }
}

/// Numeric cell: accepts `$`, `,`, K/M/B/T suffixes and a trailing `x`.
pub fn parse_cell_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_suffix('x')
        .or_else(|| trimmed.strip_suffix('X'))
        .unwrap_or(trimmed);
    parse_magnitude(trimmed)
}

fn tokens_from_table(headers: &[String], rows: &[Vec<String>]) -> Result<Vec<SpotToken>> {
    let layout = ColumnLayout::from_headers(headers);
    let ticker_col = layout
        .ticker
        .ok_or_else(|| AppError::Parse("Spot table has no ticker column".to_string()))?;

    let cell = |row: &Vec<String>, col: Option<usize>| -> Option<f64> {
        col.and_then(|c| row.get(c)).and_then(|v| parse_cell_value(v))
    };

    let tokens = rows
        .iter()
        .filter_map(|row| {
            let ticker = clean_ticker(row.get(ticker_col)?);
            if ticker.is_empty() {
                return None;
            }
            let market_cap = cell(row, layout.market_cap);
            let volume = cell(row, layout.volume);
            let ratio = cell(row, layout.ratio).unwrap_or_else(|| match (market_cap, volume) {
                (Some(mc), Some(vol)) if mc > 0.0 => vol / mc,
                _ => 0.0,
            });
            Some(SpotToken {
                ticker,
                market_cap,
                volume,
                ratio,
            })
        })
        .collect();

    Ok(tokens)
}

pub fn parse_spot_csv(text: &str) -> Result<Vec<SpotToken>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    tokens_from_table(&headers, &rows)
}

fn html_unescape(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn cell_text(inner: &str) -> String {
    let stripped = TAG_RE.replace_all(inner, "");
    html_unescape(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read the first `<table>` of an HTML document.
///
/// The first row is the header; a later all-`<th>` row replaces it while no data
/// row has been seen yet. A page without a table (an empty spot report) or
/// without data rows yields no tokens.
pub fn parse_spot_html(html: &str) -> Result<Vec<SpotToken>> {
    let Some(table) = TABLE_RE.find(html) else {
        log::info!("Spot table: no <table> in spot report, treating as empty");
        return Ok(Vec::new());
    };

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for row in ROW_RE.captures_iter(table.as_str()) {
        let cells: Vec<(bool, String)> = CELL_RE
            .captures_iter(&row[1])
            .map(|c| (c[1].eq_ignore_ascii_case("h"), cell_text(&c[2])))
            .collect();
        if cells.is_empty() {
            continue;
        }

        let is_header_row = cells.iter().all(|(is_th, _)| *is_th);
        let values: Vec<String> = cells.into_iter().map(|(_, text)| text).collect();
        if header.is_none() || (is_header_row && rows.is_empty()) {
            header = Some(values.iter().map(|v| normalize_header(v)).collect());
        } else {
            rows.push(values);
        }
    }

    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let headers = header.unwrap_or_default();
    tokens_from_table(&headers, &rows)
}

/// Load a spot table from `.csv` or `.html`.
pub fn load_spot_table(path: &Path) -> Result<Vec<SpotToken>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!("Spot table: parsing {}", name);

    let text = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let tokens = match extension.as_str() {
        "html" | "htm" => parse_spot_html(&text)?,
        "csv" => parse_spot_csv(&text)?,
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unsupported spot file type '.{}'",
                other
            )))
        }
    };

    log::info!("Spot table: extracted {} spot tokens", tokens.len());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_with_tracker_column_names() {
        let csv = "Symbol,Marketcap,Volume,Flipping Multiple\n\
                   pepe,4100000000,6200000000,1.51\n\
                   $WIF,2.1B,2.9B,1.38x\n\
                   ,1,2,3\n";
        let tokens = parse_spot_csv(csv).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].ticker, "PEPE");
        assert_eq!(tokens[0].market_cap, Some(4.1e9));
        assert_eq!(tokens[1].ticker, "WIF");
        assert_eq!(tokens[1].ratio, 1.38);
    }

    #[test]
    fn test_missing_ratio_is_derived() {
        let csv = "token_name,market_cap,volume_24h\nBONK,100,250\nDUST,0,5\n";
        let tokens = parse_spot_csv(csv).unwrap();
        assert_eq!(tokens[0].ticker, "BONK");
        assert_eq!(tokens[0].ratio, 2.5);
        assert_eq!(tokens[1].ratio, 0.0);
    }

    #[test]
    fn test_csv_without_ticker_column() {
        assert!(parse_spot_csv("price,volume\n1,2\n").is_err());
    }

    #[test]
    fn test_html_table() {
        let html = r#"<html><body>
            <div class="summary">Total 2</div>
            <table class="data">
              <thead><tr><th>Rank</th><th>Ticker</th><th>Market Cap</th><th>Volume 24h</th><th>Spot VTMR</th><th>Verifications</th><th>Large Cap</th></tr></thead>
              <tbody>
                <tr><td>1</td><td><strong>FLOKI</strong></td><td>$2.10B</td><td>$3.50B</td><td>1.7x</td><td>3</td><td>Yes</td></tr>
                <tr><td>2</td><td>A&amp;B</td><td>$1.00M</td><td>$900.00K</td><td>0.9x</td><td>2</td><td>No</td></tr>
              </tbody>
            </table>
            <table><tr><th>ignored</th></tr></table>
        </body></html>"#;
        let tokens = parse_spot_html(html).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].ticker, "FLOKI");
        assert_eq!(tokens[0].market_cap, Some(2.1e9));
        assert_eq!(tokens[0].ratio, 1.7);
        assert_eq!(tokens[1].ticker, "AB");
        assert_eq!(tokens[1].volume, Some(900e3));
    }

    #[test]
    fn test_html_without_table_is_empty() {
        assert!(parse_spot_html("<p>No high-volume tokens found</p>").unwrap().is_empty());
        assert!(parse_spot_html("<table><tr><th>Ticker</th></tr></table>").unwrap().is_empty());
    }

    #[test]
    fn test_html_rows_without_ticker_column() {
        let html = "<table><tr><th>Price</th></tr><tr><td>1.0</td></tr></table>";
        assert!(parse_spot_html(html).is_err());
    }

    #[test]
    fn test_parse_cell_value() {
        assert_eq!(parse_cell_value("1.5x"), Some(1.5));
        assert_eq!(parse_cell_value("$1.50B"), Some(1.5e9));
        assert_eq!(parse_cell_value("Yes"), None);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("alice_spot.csv");
        std::fs::write(&csv_path, "ticker,spot_vtmr\nSOL,0.9\n").unwrap();
        let tokens = load_spot_table(&csv_path).unwrap();
        assert_eq!(tokens[0].ticker, "SOL");

        let txt_path = dir.path().join("alice_spot.txt");
        std::fs::write(&txt_path, "ticker\nSOL\n").unwrap();
        assert!(load_spot_table(&txt_path).is_err());
    }
}
