//! Instrument terms tracked by the digest

use std::fmt;
use std::str::FromStr;

/// A fixed-maturity treasury instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    FiveYear,
    SevenYear,
    TenYear,
    TwentyYear,
    ThirtyYear,
}

impl Term {
    /// Every tracked term, in the order a cycle visits them
    pub const ALL: [Term; 5] = [
        Term::FiveYear,
        Term::SevenYear,
        Term::TenYear,
        Term::TwentyYear,
        Term::ThirtyYear,
    ];

    /// Short code used in commands and env keys, e.g. `10y`
    pub fn code(&self) -> &'static str {
        match self {
            Term::FiveYear => "5y",
            Term::SevenYear => "7y",
            Term::TenYear => "10y",
            Term::TwentyYear => "20y",
            Term::ThirtyYear => "30y",
        }
    }

    /// Symbol on the live quote page
    pub fn quote_symbol(&self) -> &'static str {
        match self {
            Term::FiveYear => "US5Y",
            Term::SevenYear => "US7Y",
            Term::TenYear => "US10Y",
            Term::TwentyYear => "US20Y",
            Term::ThirtyYear => "US30Y",
        }
    }

    /// Column header of this term in the bulk yield CSV
    pub fn series_column(&self) -> &'static str {
        match self {
            Term::FiveYear => "5 Yr",
            Term::SevenYear => "7 Yr",
            Term::TenYear => "10 Yr",
            Term::TwentyYear => "20 Yr",
            Term::ThirtyYear => "30 Yr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Term::FiveYear => "5-Year",
            Term::SevenYear => "7-Year",
            Term::TenYear => "10-Year",
            Term::TwentyYear => "20-Year",
            Term::ThirtyYear => "30-Year",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Term {
    type Err = String;

    /// Accepts `10y`, `10Y`, `10` or the quote symbol `US10Y`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized.strip_prefix("us").unwrap_or(&normalized);
        let normalized = normalized.strip_suffix('y').unwrap_or(normalized);

        match normalized {
            "5" => Ok(Term::FiveYear),
            "7" => Ok(Term::SevenYear),
            "10" => Ok(Term::TenYear),
            "20" => Ok(Term::TwentyYear),
            "30" => Ok(Term::ThirtyYear),
            _ => Err(format!(
                "❌ Unknown term: '{}'. Supported: {}",
                s,
                Term::ALL.iter().map(|t| t.code()).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}
