//! Historical yield series models

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

/// One dated row of the bulk yield table
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRow {
    pub date: NaiveDate,
    /// Column name → parsed yield, `None` when the cell was blank or not numeric
    pub values: HashMap<String, Option<f64>>,
}

impl YieldRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// Dated yield table, unique by date and sorted ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YieldSeries {
    /// Value columns in header order, the date column excluded
    pub columns: Vec<String>,
    pub rows: Vec<YieldRow>,
}

impl YieldSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The `window` most recent rows, still ascending by date.
    /// Selection walks the rows newest-first and re-sorts the kept slice.
    pub fn most_recent(&self, window: usize) -> YieldSeries {
        let mut newest_first: Vec<YieldRow> = self.rows.clone();
        newest_first.sort_by(|a, b| b.date.cmp(&a.date));
        newest_first.truncate(window);
        newest_first.sort_by_key(|r| r.date);

        YieldSeries {
            columns: self.columns.clone(),
            rows: newest_first,
        }
    }

    /// Combine with a table covering earlier dates. Rows from `self` win on a
    /// shared date; columns only the earlier table has are appended.
    pub fn merge(self, earlier: YieldSeries) -> YieldSeries {
        let mut columns = self.columns;
        for column in earlier.columns {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }

        let mut by_date: BTreeMap<NaiveDate, YieldRow> =
            earlier.rows.into_iter().map(|r| (r.date, r)).collect();
        by_date.extend(self.rows.into_iter().map(|r| (r.date, r)));

        YieldSeries {
            columns,
            rows: by_date.into_values().collect(),
        }
    }

    /// Rows up to and including the latest date on or before `date`.
    /// When every row is later than `date`, only the earliest row is kept.
    pub fn at_or_before(&self, date: NaiveDate) -> YieldSeries {
        let end = self
            .rows
            .partition_point(|r| r.date <= date)
            .max(1)
            .min(self.rows.len());

        YieldSeries {
            columns: self.columns.clone(),
            rows: self.rows[..end].to_vec(),
        }
    }

    /// `(date, value)` pairs for one column in series order
    pub fn column_values(&self, column: &str) -> Vec<(NaiveDate, Option<f64>)> {
        self.rows.iter().map(|r| (r.date, r.value(column))).collect()
    }
}
