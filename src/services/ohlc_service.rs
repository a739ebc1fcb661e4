use crate::models::{OhlcBar, YieldSeries};

/// Derive synthetic candlesticks from one yield column of an ascending series.
///
/// Each bar opens at the previous row's close and closes at the row's own
/// value; high and low are the larger and smaller of the two. The first row
/// has no open and is dropped, as is any row whose own value or predecessor's
/// value is missing.
pub fn synthesize(series: &YieldSeries, column: &str) -> Vec<OhlcBar> {
    series
        .rows
        .windows(2)
        .filter_map(|pair| {
            let open = pair[0].value(column)?;
            let close = pair[1].value(column)?;
            Some(OhlcBar {
                date: pair[1].date,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
            })
        })
        .collect()
}
