//! Data models for the yield digest
//!
//! Transient records passed between the fetch, transform and dispatch stages.
//! Nothing here is persisted.

pub mod term;
pub mod quote;
pub mod series;
pub mod ohlc;
pub mod payload;

pub use term::Term;
pub use quote::{ChangeDirection, QuoteSnapshot, QuoteStats, NOT_AVAILABLE};
pub use series::{YieldRow, YieldSeries};
pub use ohlc::OhlcBar;
pub use payload::{DeliveryPayload, SeriesSummary};
