//! Delivery payload models

use chrono::NaiveDate;

use super::{QuoteSnapshot, Term};

/// Figures derived from the yield series alongside the chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSummary {
    pub latest_date: Option<NaiveDate>,
    pub latest_yield: Option<f64>,
    /// Percent change against the previous observation
    pub change_pct: Option<f64>,
    /// Latest yield plus the mean daily move of the recent observations
    pub expected_next: Option<f64>,
}

/// Everything one destination receives for one term in one cycle
#[derive(Debug, Clone)]
pub struct DeliveryPayload {
    pub term: Term,
    pub snapshot: QuoteSnapshot,
    pub summary: SeriesSummary,
    pub chart_png: Vec<u8>,
    pub last_trade_time: String,
}

impl DeliveryPayload {
    pub fn title(&self) -> String {
        format!("📈 US {} Treasury Yield", self.term.display_name())
    }

    pub fn chart_filename(&self) -> String {
        format!("yield_{}.png", self.term.code())
    }
}
