use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use serenity::async_trait;
use tracing::{debug, info};

use crate::api::market::{ApiError, MarketDataClient};
use crate::models::{DeliveryPayload, Term, YieldSeries};
use crate::services::chart_service::ChartRenderer;
use crate::services::snapshot_service::{extract_snapshot, QuoteSelectors};
use crate::services::{ohlc_service, series_service};
use crate::utils::{FetchError, RenderError};

/// Produces the digest payload for a term
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn build(&self, term: Term) -> Result<DeliveryPayload, FetchError>;
}

/// Knobs for one term's fetch-and-render pass
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Most recent series rows kept for the chart
    pub window_size: usize,
    /// Pause between the quote request and the series request
    pub politeness_delay: Duration,
    /// Timezone whose calendar year selects the current yearly series file
    pub timezone: Tz,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            window_size: 60,
            politeness_delay: Duration::from_millis(1000),
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// Fetches both sources for a term and assembles its delivery payload
pub struct YieldFetcher {
    client: MarketDataClient,
    selectors: QuoteSelectors,
    renderer: Arc<dyn ChartRenderer>,
    settings: FetchSettings,
}

impl YieldFetcher {
    pub fn new(
        client: MarketDataClient,
        selectors: QuoteSelectors,
        renderer: Arc<dyn ChartRenderer>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            client,
            selectors,
            renderer,
            settings,
        }
    }

    fn map_api_error(term: Term, e: ApiError, unavailable: fn(Term, String) -> FetchError) -> FetchError {
        match e {
            ApiError::Timeout => FetchError::Timeout(term),
            ApiError::Transport(msg) | ApiError::Setup(msg) => FetchError::TransportError(term, msg),
            other => unavailable(term, other.to_string()),
        }
    }

    /// Fetch and parse one calendar year of the bulk yield table
    pub async fn series_for_year(&self, term: Term, year: i32) -> Result<YieldSeries, FetchError> {
        debug!("Fetching {} yield series for {}", year, term);
        let csv_text = self
            .client
            .get_series_csv(year)
            .await
            .map_err(|e| Self::map_api_error(term, e, FetchError::SeriesUnavailable))?;

        Ok(series_service::load_series(&csv_text)?)
    }

    /// The `window_size` most recent rows as of `year`. A current-year file
    /// that is still short is topped up from the previous year's file.
    pub async fn windowed_series(&self, term: Term, year: i32) -> Result<YieldSeries, FetchError> {
        // The same yearly files are fetched again for every term
        let mut series = self.series_for_year(term, year).await?;

        if series.len() < self.settings.window_size {
            tokio::time::sleep(self.settings.politeness_delay).await;
            match self.series_for_year(term, year - 1).await {
                Ok(earlier) => series = series.merge(earlier),
                Err(e) if !series.is_empty() => {
                    debug!("Keeping {} rows from {} only: {}", series.len(), year, e);
                }
                Err(e) => return Err(e),
            }
        }

        let column = term.series_column();
        if series.is_empty() {
            return Err(FetchError::SeriesUnavailable(term, "series has no rows".to_string()));
        }
        if !series.has_column(column) {
            return Err(FetchError::SeriesUnavailable(term, format!("no '{}' column", column)));
        }

        Ok(series.most_recent(self.settings.window_size))
    }

    /// Run the full pipeline for one term.
    ///
    /// Steps run strictly in order: quote request, politeness pause, quote
    /// extraction, series request, load, windowing, synthesis, render. The
    /// render runs on the blocking pool. There is no retry; the next scheduled
    /// cycle tries again.
    pub async fn run(&self, term: Term) -> Result<DeliveryPayload, FetchError> {
        debug!("Fetching live quote for {}", term);
        let quote_html = self
            .client
            .get_quote_page(term)
            .await
            .map_err(|e| Self::map_api_error(term, e, FetchError::QuoteUnavailable))?;

        tokio::time::sleep(self.settings.politeness_delay).await;

        let snapshot = extract_snapshot(&quote_html, &self.selectors)?;

        let year = Utc::now().with_timezone(&self.settings.timezone).year();
        let window = self.windowed_series(term, year).await?;
        let column = term.series_column();
        let summary = series_service::summarize(&window, column);
        let bars = ohlc_service::synthesize(&window, column);
        debug!("{}: {} rows in window, {} bars synthesized", term, window.len(), bars.len());

        let title = format!("US {} Treasury Yield ({} sessions)", term.display_name(), window.len());
        let renderer = Arc::clone(&self.renderer);
        let chart_png = tokio::task::spawn_blocking(move || renderer.render(&title, &bars))
            .await
            .map_err(|e| RenderError::Drawing(format!("Chart task failed: {}", e)))??;

        info!("✓ Built {} digest: last {} ({} chart bytes)", term, snapshot.last_price, chart_png.len());

        Ok(DeliveryPayload {
            term,
            last_trade_time: snapshot.last_trade_time.clone(),
            snapshot,
            summary,
            chart_png,
        })
    }
}

#[async_trait]
impl PayloadSource for YieldFetcher {
    async fn build(&self, term: Term) -> Result<DeliveryPayload, FetchError> {
        self.run(term).await
    }
}
