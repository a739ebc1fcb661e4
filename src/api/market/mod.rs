pub mod client;
pub mod models;

pub use client::MarketDataClient;
pub use models::{ApiError, SourceConfig};
