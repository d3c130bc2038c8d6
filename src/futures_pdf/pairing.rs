//! Name/ticker pairing and positional reconciliation.
//!
//! Text extraction loses the table structure: a token's name, its ticker and
//! its numeric columns come out as separate lines. Names and tickers are
//! paired first; the pairs are then matched to financial rows by position.

use super::lines::FinancialRow;

/// Longest raw line that can still be a ticker
const MAX_TICKER_LINE_CHARS: usize = 15;
const MIN_TICKER_LEN: usize = 2;
const MAX_TICKER_LEN: usize = 12;

/// Uppercase and drop everything that is not `A-Z` or `0-9`.
pub fn clean_ticker(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Cleaned ticker, if the raw line is ticker-shaped.
pub fn strict_ticker(text: &str) -> Option<String> {
    if text.chars().count() > MAX_TICKER_LINE_CHARS {
        return None;
    }
    let cleaned = clean_ticker(text);
    (MIN_TICKER_LEN..=MAX_TICKER_LEN)
        .contains(&cleaned.len())
        .then_some(cleaned)
}

/// Token name as printed, and its cleaned ticker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTickerPair {
    pub name: String,
    pub ticker: String,
}

/// Walk the text lines and pair names with tickers.
///
/// A line followed by a valid ticker line becomes (name, ticker), whatever
/// the shape of the name line itself; the walk then skips both lines.
/// Otherwise it advances by one line.
pub fn pair_names_and_tickers<S: AsRef<str>>(text_lines: &[S]) -> Vec<NameTickerPair> {
    let mut pairs = Vec::new();
    let mut i = 0;

    while i + 1 < text_lines.len() {
        let current = text_lines[i].as_ref();
        let next = text_lines[i + 1].as_ref();

        match strict_ticker(next) {
            Some(ticker) => {
                pairs.push(NameTickerPair {
                    name: current.to_string(),
                    ticker,
                });
                i += 2;
            }
            None => i += 1,
        }
    }

    pairs
}

/// Zip pairs and financial rows by position; the longer side is truncated.
pub fn reconcile(
    pairs: Vec<NameTickerPair>,
    financials: Vec<FinancialRow>,
) -> Vec<(NameTickerPair, FinancialRow)> {
    if pairs.len() != financials.len() {
        log::debug!(
            "Futures PDF: {} name/ticker pairs vs {} financial rows, keeping {}",
            pairs.len(),
            financials.len(),
            pairs.len().min(financials.len())
        );
    }
    pairs.into_iter().zip(financials).collect()
}
