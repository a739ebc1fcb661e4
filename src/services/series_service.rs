use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{SeriesSummary, YieldRow, YieldSeries};
use crate::utils::ParseError;

/// Header of the date column in the bulk yield table
pub const DATE_COLUMN: &str = "Date";

/// Observations used for the next-day expectation
const TREND_LOOKBACK: usize = 5;

/// Parse a date cell: `MM/DD/YYYY` as published, or ISO `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn parse_yield(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load the bulk yield CSV into a series sorted ascending by date.
///
/// Fails only when the text cannot be split into a header and rows, or has no
/// `Date` column. Non-numeric cells become missing values; rows whose date
/// cannot be read are skipped; for repeated dates the last row wins.
pub fn load_series(csv_text: &str) -> Result<YieldSeries, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::MalformedTable(format!("Failed to read header row: {}", e)))?
        .clone();

    let date_idx = headers
        .iter()
        .position(|h| h == DATE_COLUMN)
        .ok_or_else(|| ParseError::MalformedTable(format!("No '{}' column in header", DATE_COLUMN)))?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut by_date: BTreeMap<NaiveDate, YieldRow> = BTreeMap::new();
    let mut skipped = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| ParseError::MalformedTable(format!("Row {}: {}", line + 2, e)))?;

        let Some(date) = record.get(date_idx).and_then(parse_date) else {
            skipped += 1;
            continue;
        };

        let values: HashMap<String, Option<f64>> = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, (name, cell))| (name.to_string(), parse_yield(cell)))
            .collect();

        by_date.insert(date, YieldRow { date, values });
    }

    if skipped > 0 {
        debug!("Skipped {} yield rows with unreadable dates", skipped);
    }

    let rows: Vec<YieldRow> = by_date.into_values().collect();
    debug!("Loaded {} yield rows across {} columns", rows.len(), columns.len());

    Ok(YieldSeries { columns, rows })
}

/// Latest yield, change from the previous observation and a naive next-day
/// expectation for one column of an ascending series
pub fn summarize(series: &YieldSeries, column: &str) -> SeriesSummary {
    let values = series.column_values(column);
    let Some(&(latest_date, latest_yield)) = values.last() else {
        return SeriesSummary::default();
    };

    let previous = values.len().checked_sub(2).and_then(|i| values[i].1);

    let change_pct = match (latest_yield, previous) {
        (Some(current), Some(prev)) if prev != 0.0 => Some((current - prev) / prev * 100.0),
        _ => None,
    };

    let expected_next = latest_yield.filter(|_| previous.is_some()).and_then(|current| {
        let recent = &values[values.len().saturating_sub(TREND_LOOKBACK)..];
        let moves: Vec<f64> = recent
            .windows(2)
            .filter_map(|pair| match (pair[0].1, pair[1].1) {
                (Some(a), Some(b)) => Some(b - a),
                _ => None,
            })
            .collect();
        if moves.is_empty() {
            None
        } else {
            Some(current + moves.iter().sum::<f64>() / moves.len() as f64)
        }
    });

    SeriesSummary {
        latest_date: Some(latest_date),
        latest_yield,
        change_pct,
        expected_next,
    }
}

/// Summary as of the closest session on or before `date`, or as of the
/// earliest session when the series starts after it
pub fn summarize_at(series: &YieldSeries, column: &str, date: NaiveDate) -> SeriesSummary {
    summarize(&series.at_or_before(date), column)
}
