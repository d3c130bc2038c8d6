//! HTML rendering of the spot and cross-market reports.

use super::merge::{CrossMarketReport, SpotToken};
use super::{format_ratio, html_escape, money, short_num};
use crate::futures_pdf::signals::{FundingReading, OiSignal};
use crate::futures_pdf::FuturesTokenRecord;
use crate::verify::VerifiedToken;
use chrono::NaiveDateTime;
use std::fmt::Write;

pub const MATCHED_TITLE: &str = "Tokens in Both Futures & Spot Markets";
pub const FUTURES_ONLY_TITLE: &str = "Remaining Futures-Only Tokens";
pub const SPOT_ONLY_TITLE: &str = "Remaining Spot-Only Tokens";

pub const MATCHED_HEADERS: &[&str] = &[
    "Ticker",
    "Spot MrktCap",
    "Spot Volume",
    "Spot VTMR",
    "Futures Volume",
    "Futures VTMR",
    "OISS",
    "Funding Rate",
];
pub const FUTURES_HEADERS: &[&str] = &["Ticker", "Market Cap", "Volume", "VTMR", "OISS", "Funding Rate"];
pub const SPOT_HEADERS: &[&str] = &["Ticker", "Market Cap", "Volume", "Spot VTMR"];
pub const SPOT_REPORT_HEADERS: &[&str] = &[
    "Rank",
    "Ticker",
    "Market Cap",
    "Volume 24h",
    "Spot VTMR",
    "Verifications",
    "Large Cap",
];

const SPOT_STYLE: &str = "
    body { font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }
    .header { text-align: center; background-color: #2c3e50; color: white; padding: 20px; border-radius: 10px; }
    .summary { background-color: #34495e; color: white; padding: 15px; border-radius: 8px; margin: 10px 0; }
    .table { width: 100%; border-collapse: collapse; background-color: white; }
    .table th { background-color: #3498db; color: white; padding: 12px; text-align: left; }
    .table td { padding: 10px; border-bottom: 1px solid #ddd; }
    .table tr:nth-child(even) { background-color: #f2f2f2; }
    .footer { text-align: center; margin-top: 20px; color: #7f8c8d; }
    .large-cap { background-color: #e8f6f3 !important; }
    .high-volume { color: #e74c3c; font-weight: bold; }
    .empty { text-align: center; padding: 40px; }
";

const CROSS_STYLE: &str = "
    body { margin: 20px; background: #f5f5f5; font-family: Arial, sans-serif; }
    .table-container { margin: 20px 0; background: white; padding: 15px; border-radius: 10px; }
    table { width: 100%; border-collapse: collapse; margin: 10px 0; }
    th, td { padding: 10px; border: 1px solid #ddd; text-align: left; }
    th { background: #2c3e50; color: white; }
    tr:nth-child(even) { background: #f9f9f9; }
    .header { background: #2c3e50; color: white; padding: 20px; border-radius: 10px; text-align: center; }
    h2 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
    .footer { text-align: center; margin-top: 20px; color: #7f8c8d; }
    .cheat-sheet { margin-top: 30px; padding: 15px; background: #ecf0f1; border-radius: 8px; }
    .signal { font-size: 0.8em; color: #7f8c8d; }
    .oi-strong { color: #27ae60; font-weight: bold; }
    .oi-weak { color: #c0392b; }
";

const CHEAT_SHEET: &str = r#"<div class="cheat-sheet">
<h2>OISS &amp; Funding Cheat Sheet</h2>
<ul>
<li><strong>Bullish squeeze:</strong> OI rising while funding is negative. New money arrives against a crowded short side; forced buybacks can spike the price.</li>
<li><strong>Uptrend:</strong> OI rising with positive funding. Broad participation, but longs pay to hold the trend.</li>
<li><strong>Short covering:</strong> OI falling with negative funding. Shorts close out; the bounce lacks fresh buyers.</li>
<li><strong>Flatline:</strong> OI flat with positive funding. No new capital, fees keep accruing.</li>
<li><strong>Bearish dump:</strong> OI falling with positive funding. Longs exit or get liquidated.</li>
<li><strong>OISS</strong> is the Open Interest Signal Score (0-5) derived from the 24h OI change.</li>
</ul>
<h2>Reading VTMR</h2>
<ul>
<li><strong>Futures VTMR &gt; Spot VTMR:</strong> leverage is driving the tape; expect wicks and liquidation hunts.</li>
<li><strong>Spot VTMR &gt; Futures VTMR:</strong> buyers want the asset itself; accumulation tends to be steadier.</li>
<li><strong>VTMR above 1.0x:</strong> the token turns over its whole market cap in a day. Active, volatile, not a guarantee of upside.</li>
</ul>
<h2>Disclaimer</h2>
<small>Research aid only. Verify the data and trade at your own risk.</small>
</div>"#;

fn page(title: &str, style: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        style,
        body
    )
}

fn header_block(title: &str, subtitle: &str, generated_at: NaiveDateTime) -> String {
    format!(
        "<div class=\"header\"><h1>{}</h1><p>{}</p><p><small>Generated on: {}</small></p></div>",
        html_escape(title),
        html_escape(subtitle),
        generated_at.format("%d-%m-%Y %H:%M:%S")
    )
}

/// Spot volume report for the verified tokens (already sorted by ratio)
pub fn render_spot_report(tokens: &[VerifiedToken], generated_at: NaiveDateTime) -> String {
    let peak = tokens.iter().map(|t| t.ratio).fold(0.0_f64, f64::max);
    let high_volume = tokens.iter().filter(|t| t.ratio >= 2.0).count();
    let large_caps = tokens.iter().filter(|t| t.is_large_cap).count();

    let mut body = header_block(
        "Spot Volume Crypto Tracker",
        "High Volume Spot Tokens Analysis",
        generated_at,
    );

    let _ = write!(
        body,
        "<div class=\"summary\"><h3>Summary</h3>\
         <p>Total High-Volume Tokens: {}</p>\
         <p>Peak Flipping (VTMR) Multiple: {}</p>\
         <p>High-Volume Tokens (2x+): {}</p>\
         <p>Large-Cap Tokens (&gt;$1B): {}</p></div>",
        tokens.len(),
        format_ratio(peak),
        high_volume,
        large_caps
    );

    if tokens.is_empty() {
        body.push_str("<div class=\"empty\"><h3>No high-volume tokens found</h3></div>");
    } else {
        body.push_str("<table class=\"table\"><thead><tr>");
        for header in SPOT_REPORT_HEADERS {
            let _ = write!(body, "<th>{}</th>", header);
        }
        body.push_str("</tr></thead><tbody>");

        for (index, token) in tokens.iter().enumerate() {
            let row_class = if token.is_large_cap { "large-cap" } else { "" };
            let volume_class = if token.ratio >= 2.0 { "high-volume" } else { "" };
            let _ = write!(
                body,
                "<tr class=\"{}\"><td>#{}</td><td><b>{}</b></td><td>${}</td><td>${}</td>\
                 <td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>",
                row_class,
                index + 1,
                html_escape(&token.symbol),
                short_num(token.market_cap),
                short_num(token.volume),
                volume_class,
                format_ratio(token.ratio),
                token.source_count,
                if token.is_large_cap { "Yes" } else { "No" }
            );
        }
        body.push_str("</tbody></table>");
    }

    body.push_str("<div class=\"footer\"><p>Generated by crypto-vat spot tracker</p></div>");
    page("Crypto Volume Tracker", SPOT_STYLE, &body)
}

fn oiss_cell(signal: Option<&OiSignal>) -> String {
    match signal {
        None => "-".to_string(),
        Some(s) => match s.css_class() {
            Some(class) => format!(
                "<span class=\"{}\">{}</span> {}",
                class,
                html_escape(&s.percent_text()),
                html_escape(&s.label)
            ),
            None => html_escape(&s.to_string()),
        },
    }
}

fn funding_cell(funding: &FundingReading) -> String {
    match (funding.signal(), funding.css_class()) {
        (Some(signal), Some(class)) => format!(
            "<span class=\"{}\">{}</span> <span class=\"signal\">{}</span>",
            class,
            html_escape(&funding.rate_text()),
            signal.as_str()
        ),
        _ => html_escape(&funding.to_string()),
    }
}

/// One titled table; rows are pre-rendered (escaped) cell lists
fn table_section(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = format!("<div class=\"table-container\"><h2>{}</h2>", html_escape(title));
    if rows.is_empty() {
        out.push_str("<p>No data found</p></div>");
        return out;
    }

    out.push_str("<table class=\"table\"><thead><tr>");
    for header in headers {
        let _ = write!(out, "<th>{}</th>", html_escape(header));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", cell);
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table></div>");
    out
}

fn futures_row(f: &FuturesTokenRecord) -> Vec<String> {
    vec![
        html_escape(&f.ticker),
        html_escape(&f.market_cap),
        html_escape(&f.volume),
        format_ratio(f.vtmr),
        oiss_cell(f.oiss.as_ref()),
        funding_cell(&f.funding),
    ]
}

fn spot_row(s: &SpotToken) -> Vec<String> {
    vec![
        html_escape(&s.ticker),
        html_escape(&money(s.market_cap)),
        html_escape(&money(s.volume)),
        format_ratio(s.ratio),
    ]
}

pub fn render_cross_market_report(report: &CrossMarketReport, generated_at: NaiveDateTime) -> String {
    let matched: Vec<Vec<String>> = report
        .matched
        .iter()
        .map(|m| {
            vec![
                html_escape(m.ticker()),
                html_escape(&money(m.spot.market_cap)),
                html_escape(&money(m.spot.volume)),
                format_ratio(m.spot.ratio),
                html_escape(&m.futures.volume),
                format_ratio(m.futures.vtmr),
                oiss_cell(m.futures.oiss.as_ref()),
                funding_cell(&m.futures.funding),
            ]
        })
        .collect();
    let futures_only: Vec<Vec<String>> = report.futures_only.iter().map(futures_row).collect();
    let spot_only: Vec<Vec<String>> = report.spot_only.iter().map(spot_row).collect();

    let mut body = header_block(
        "Cross-Market Crypto Analysis Report",
        "Using Both Spot & Futures Market Data",
        generated_at,
    );
    body.push_str(&table_section(MATCHED_TITLE, MATCHED_HEADERS, &matched));
    body.push_str(&table_section(FUTURES_ONLY_TITLE, FUTURES_HEADERS, &futures_only));
    body.push_str(&table_section(SPOT_ONLY_TITLE, SPOT_HEADERS, &spot_only));
    body.push_str(CHEAT_SHEET);
    body.push_str("<div class=\"footer\"><p>Generated by crypto-vat</p></div>");

    page("Crypto Volume-driven Data Analysis Report", CROSS_STYLE, &body)
}
