//! Report generation
//!
//! - `merge`: cross-market join of spot tokens and futures rows
//! - `html`: spot and cross-market HTML reports
//! - `pdf`: printable cross-market report

pub mod html;
pub mod merge;
pub mod pdf;

use crate::error::{AppError, Result};
use chrono::NaiveDateTime;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Compact magnitude: `1.50B`, `200.00M`, `12.30K`, or a rounded integer.
pub fn short_num(n: f64) -> String {
    if n >= 1_000_000_000.0 {
        format!("{:.2}B", n / 1_000_000_000.0)
    } else if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{}", n.round() as i64)
    }
}

/// `$`-prefixed magnitude, or `-` when unknown
pub fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("${}", short_num(v)))
}

/// Volume-to-market-cap multiple, e.g. `1.5x`
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.1}x", ratio)
}

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `{user}_Volumed_Spot_Tokens_{Mon-DD-YY}.html`
pub fn spot_report_file_name(user: &str, at: NaiveDateTime) -> String {
    format!("{}_Volumed_Spot_Tokens_{}.html", user, at.format("%b-%d-%y"))
}

/// `{YYYY-MM-DD_HH-MM-SS}-crypto-analysis.{extension}`
pub fn cross_report_file_name(at: NaiveDateTime, extension: &str) -> String {
    format!("{}-crypto-analysis.{}", at.format("%Y-%m-%d_%H-%M-%S"), extension)
}

/// Write `bytes` to `path` through a temp file in the same directory.
///
/// The target either keeps its previous content or gets the full new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| AppError::Report(format!("Failed to save {}: {}", path.display(), e)))?;

    log::info!("Report: wrote {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_short_num() {
        assert_eq!(short_num(1_500_000_000.0), "1.50B");
        assert_eq!(short_num(200_000_000.0), "200.00M");
        assert_eq!(short_num(12_300.0), "12.30K");
        assert_eq!(short_num(999.6), "1000");
        assert_eq!(short_num(0.0), "0");
    }

    #[test]
    fn test_money_and_ratio() {
        assert_eq!(money(Some(2_100_000_000.0)), "$2.10B");
        assert_eq!(money(None), "-");
        assert_eq!(format_ratio(1.5), "1.5x");
        assert_eq!(format_ratio(0.8), "0.8x");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>A&B</b>"), "&lt;b&gt;A&amp;B&lt;/b&gt;");
        assert_eq!(html_escape("it's \"x\""), "it&#39;s &quot;x&quot;");
    }

    #[test]
    fn test_file_names() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(spot_report_file_name("alice", at), "alice_Volumed_Spot_Tokens_Mar-07-26.html");
        assert_eq!(cross_report_file_name(at, "pdf"), "2026-03-07_09-05-01-crypto-analysis.pdf");
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.html");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
