//! Printable (PDF) version of the cross-market report.
//!
//! A4 portrait, built-in Helvetica. Built-in fonts only cover ASCII, so every
//! string goes through [`ascii_text`] first.

use super::merge::CrossMarketReport;
use super::{format_ratio, money};
use super::html::{
    FUTURES_HEADERS, FUTURES_ONLY_TITLE, MATCHED_HEADERS, MATCHED_TITLE, SPOT_HEADERS,
    SPOT_ONLY_TITLE,
};
use crate::error::{AppError, Result};
use crate::futures_pdf::signals::oiss_text;
use chrono::NaiveDateTime;
use printpdf::*;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 20.0;
const RIGHT: f32 = 190.0;
const BOTTOM: f32 = 30.0;
const TOP: f32 = 277.0;
const ROW_HEIGHT: f32 = 6.0;
const MAX_CELL_CHARS: usize = 18;

/// Replace anything outside printable ASCII
pub fn ascii_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '–' | '—' => '-',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max - 3).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::Report(format!("PDF rendering failed: {}", e))
}

/// Evenly spaced column x positions between the margins
fn column_positions(columns: usize) -> Vec<f32> {
    let width = (RIGHT - LEFT) / columns.max(1) as f32;
    (0..columns).map(|i| LEFT + i as f32 * width).collect()
}

/// Page cursor: starts a new page whenever the next row would cross the bottom margin
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    y: f32,
    pages: usize,
    footer: String,
}

impl PdfWriter {
    fn new(title: &str, footer: String) -> Result<Self> {
        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;
        let layer = doc.get_page(page1).get_layer(layer1);

        let writer = Self {
            doc,
            layer,
            font,
            font_bold,
            y: TOP,
            pages: 1,
            footer,
        };
        writer.draw_footer();
        Ok(writer)
    }

    fn text(&self, bold: bool, x: f32, y: f32, size: f32, text: &str) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer.use_text(ascii_text(text), size, Mm(x), Mm(y), font);
    }

    fn rule(&self, y: f32) {
        let line = Line {
            points: vec![
                (Point::new(Mm(LEFT), Mm(y)), false),
                (Point::new(Mm(RIGHT), Mm(y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn draw_footer(&self) {
        let text = format!("{} - page {}", self.footer, self.pages);
        self.text(false, LEFT, 15.0, 8.0, &text);
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Layer {}", self.pages + 1),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
        self.y = TOP;
        self.draw_footer();
    }

    /// Make room for `height` mm, breaking the page if needed
    fn reserve(&mut self, height: f32) {
        if self.y - height < BOTTOM {
            self.new_page();
        }
    }

    fn header_row(&mut self, headers: &[&str], xs: &[f32]) {
        for (header, x) in headers.iter().zip(xs) {
            self.text(true, *x, self.y, 8.0, header);
        }
        self.y -= 2.5;
        self.rule(self.y);
        self.y -= 4.5;
    }

    fn section(&mut self, title: &str, headers: &[&str], rows: &[Vec<String>]) {
        self.reserve(20.0);
        self.text(true, LEFT, self.y, 12.0, title);
        self.y -= 8.0;

        if rows.is_empty() {
            self.text(false, LEFT, self.y, 9.0, "No data found");
            self.y -= 12.0;
            return;
        }

        let xs = column_positions(headers.len());
        self.header_row(headers, &xs);

        for row in rows {
            if self.y - ROW_HEIGHT < BOTTOM {
                self.new_page();
                self.header_row(headers, &xs);
            }
            for (cell, x) in row.iter().zip(&xs) {
                self.text(false, *x, self.y, 8.0, &truncate(cell, MAX_CELL_CHARS));
            }
            self.y -= ROW_HEIGHT;
        }
        self.y -= 8.0;
    }

    fn finish(self) -> Result<Vec<u8>> {
        log::debug!("PDF report: {} pages", self.pages);
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

/// Render the cross-market report as PDF bytes
pub fn render_cross_market_pdf(
    report: &CrossMarketReport,
    generated_at: NaiveDateTime,
) -> Result<Vec<u8>> {
    let stamp = generated_at.format("%d-%m-%Y %H:%M:%S").to_string();
    let mut writer = PdfWriter::new(
        "Cross-Market Crypto Analysis Report",
        format!("Generated by crypto-vat - {}", stamp),
    )?;

    writer.text(true, LEFT, writer.y, 18.0, "Cross-Market Crypto Analysis Report");
    writer.y -= 10.0;
    writer.text(false, LEFT, writer.y, 10.0, &format!("Generated on: {}", stamp));
    writer.y -= 14.0;

    let matched: Vec<Vec<String>> = report
        .matched
        .iter()
        .map(|m| {
            vec![
                m.ticker().to_string(),
                money(m.spot.market_cap),
                money(m.spot.volume),
                format_ratio(m.spot.ratio),
                m.futures.volume.clone(),
                format_ratio(m.futures.vtmr),
                oiss_text(m.futures.oiss.as_ref()),
                m.futures.funding.to_string(),
            ]
        })
        .collect();
    let futures_only: Vec<Vec<String>> = report
        .futures_only
        .iter()
        .map(|f| {
            vec![
                f.ticker.clone(),
                f.market_cap.clone(),
                f.volume.clone(),
                format_ratio(f.vtmr),
                oiss_text(f.oiss.as_ref()),
                f.funding.to_string(),
            ]
        })
        .collect();
    let spot_only: Vec<Vec<String>> = report
        .spot_only
        .iter()
        .map(|s| {
            vec![
                s.ticker.clone(),
                money(s.market_cap),
                money(s.volume),
                format_ratio(s.ratio),
            ]
        })
        .collect();

    writer.section(MATCHED_TITLE, MATCHED_HEADERS, &matched);
    writer.section(FUTURES_ONLY_TITLE, FUTURES_HEADERS, &futures_only);
    writer.section(SPOT_ONLY_TITLE, SPOT_HEADERS, &spot_only);

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::futures_pdf::signals::{FundingReading, OiSignal};
    use crate::futures_pdf::FuturesTokenRecord;
    use crate::report::merge::{build_cross_market, SpotToken};
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_ascii_text() {
        assert_eq!(ascii_text("BTC – ok"), "BTC - ok");
        assert_eq!(ascii_text("Pépé"), "P?p?");
        assert_eq!(ascii_text("tab\there"), "tab?here");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 18), "short");
        assert_eq!(truncate("a very long funding reading", 10), "a very ...");
    }

    #[test]
    fn test_renders_multi_page_pdf() {
        let spot: Vec<SpotToken> = (0..120)
            .map(|i| SpotToken {
                ticker: format!("TK{}", i),
                market_cap: Some(1e8),
                volume: Some(2e8),
                ratio: 2.0,
            })
            .collect();
        let futures: Vec<FuturesTokenRecord> = (0..60)
            .map(|i| FuturesTokenRecord {
                ticker: format!("TK{}", i * 2),
                name: "Tokén".to_string(),
                market_cap: "100M".to_string(),
                volume: "150M".to_string(),
                vtmr: 1.5,
                oiss: OiSignal::parse("+12%"),
                funding: FundingReading::parse(Some("-0.02%")),
            })
            .collect();
        let report = build_cross_market(&spot, &futures, 0.5).unwrap();

        let bytes = render_cross_market_pdf(&report, at()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1000);
    }

    #[test]
    fn test_renders_empty_sections() {
        let bytes = render_cross_market_pdf(&CrossMarketReport::default(), at()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
