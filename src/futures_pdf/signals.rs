//! Open-interest and funding-rate signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Open Interest Signal Score: 24h OI change mapped to a 0-5 tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OiSignal {
    /// Fractional change, `0.25` for `+25%`
    pub change: f64,
    pub score: u8,
    pub label: String,
}

fn is_placeholder(raw: &str) -> bool {
    matches!(raw.trim(), "" | "-" | "–" | "—" | "N/A")
}

/// Tier for a fractional OI change. Exactly zero is a "Build-Up".
pub fn oi_tier(change: f64) -> (u8, &'static str) {
    if change > 0.20 {
        (5, "Strong")
    } else if change > 0.10 {
        (4, "Bullish")
    } else if change >= 0.0 {
        (3, "Build-Up")
    } else if change > -0.10 {
        (2, "Weakening")
    } else if change > -0.20 {
        (1, "Exiting")
    } else {
        (0, "Exiting")
    }
}

impl OiSignal {
    /// Parse a percent string like `"+25.4%"`. Placeholders and garbage yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if is_placeholder(raw) {
            return None;
        }
        let percent = raw.replace('%', "").trim().parse::<f64>().ok()?;
        if !percent.is_finite() {
            return None;
        }
        let change = percent / 100.0;
        let (score, label) = oi_tier(change);
        Some(Self {
            change,
            score,
            label: label.to_string(),
        })
    }

    /// `oi-strong` for growth, `oi-weak` for decline
    pub fn css_class(&self) -> Option<&'static str> {
        if self.change > 0.0 {
            Some("oi-strong")
        } else if self.change < 0.0 {
            Some("oi-weak")
        } else {
            None
        }
    }

    /// Signed whole-percent change, e.g. `"+25%"`
    pub fn percent_text(&self) -> String {
        let sign = if self.change > 0.0 { "+" } else { "" };
        format!("{}{:.0}%", sign, self.change * 100.0)
    }
}

impl fmt::Display for OiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.percent_text(), self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingSignal {
    Greed,
    Bullish,
    Neutral,
    Bearish,
    ExtremeFear,
}

impl FundingSignal {
    /// Classify a funding rate given in percent (`0.01` means 0.01%).
    pub fn from_rate(percent: f64) -> Self {
        if percent >= 0.05 {
            Self::Greed
        } else if percent > 0.0 {
            Self::Bullish
        } else if percent <= -0.05 {
            Self::ExtremeFear
        } else if percent < 0.0 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greed => "Greed",
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
            Self::ExtremeFear => "Extreme Fear",
        }
    }

    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            Self::Greed | Self::Bullish => Some("oi-strong"),
            Self::Bearish | Self::ExtremeFear => Some("oi-weak"),
            Self::Neutral => None,
        }
    }
}

/// Funding column of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FundingReading {
    Missing,
    Rate { percent: f64, signal: FundingSignal },
    /// Text that is neither a placeholder nor a number, kept as printed
    Raw { text: String },
}

impl FundingReading {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        if is_placeholder(raw) {
            return Self::Missing;
        }
        match raw.replace('%', "").trim().parse::<f64>() {
            Ok(percent) if percent.is_finite() => Self::Rate {
                percent,
                signal: FundingSignal::from_rate(percent),
            },
            _ => Self::Raw {
                text: raw.trim().to_string(),
            },
        }
    }

    pub fn signal(&self) -> Option<FundingSignal> {
        match self {
            Self::Rate { signal, .. } => Some(*signal),
            _ => None,
        }
    }

    pub fn css_class(&self) -> Option<&'static str> {
        self.signal().and_then(|s| s.css_class())
    }

    /// Rate part only, `"0.01%"`, or `"-"` when missing
    pub fn rate_text(&self) -> String {
        match self {
            Self::Missing => "-".to_string(),
            Self::Rate { percent, .. } => format!("{}%", percent),
            Self::Raw { text } => text.clone(),
        }
    }
}

impl fmt::Display for FundingReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate { signal, .. } => write!(f, "{} {}", self.rate_text(), signal.as_str()),
            _ => f.write_str(&self.rate_text()),
        }
    }
}

/// `"-"` when there is no OI signal
pub fn oiss_text(signal: Option<&OiSignal>) -> String {
    signal.map_or_else(|| "-".to_string(), |s| s.to_string())
}
