//! Digest pipeline services
//!
//! Leaves first: quote extraction, series loading, OHLC synthesis and chart
//! rendering; then the fetch orchestrator, the dispatcher and the scheduler
//! that drives them.

pub mod snapshot_service;
pub mod series_service;
pub mod ohlc_service;
pub mod chart_service;
pub mod fetch_service;
pub mod dispatch_service;
pub mod scheduler_service;
