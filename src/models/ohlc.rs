//! Synthetic candlestick models

use chrono::NaiveDate;

/// One synthesized open/high/low/close bar.
/// Built from a single daily yield, so it is a visual approximation
/// rather than a traded OHLC quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

