//! Error types for each stage of the digest pipeline

use thiserror::Error;

use crate::models::Term;

/// Structurally unreadable input. Missing optional fields never produce these.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("quote page could not be parsed as markup: {0}")]
    MalformedMarkup(String),
    #[error("yield table could not be tokenized: {0}")]
    MalformedTable(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("not enough bars to draw a chart ({0} found, need at least 2)")]
    NotEnoughData(usize),
    #[error("chart drawing failed: {0}")]
    Drawing(String),
    #[error("chart file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("live quote for {0} is unavailable: {1}")]
    QuoteUnavailable(Term, String),
    #[error("yield series for {0} is unavailable: {1}")]
    SeriesUnavailable(Term, String),
    #[error("request for {0} timed out")]
    Timeout(Term),
    #[error("transport error while fetching {0}: {1}")]
    TransportError(Term, String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl FetchError {
    /// Short text for a failure notice, without transport internals
    pub fn notice_text(&self) -> String {
        match self {
            FetchError::QuoteUnavailable(term, _) => {
                format!("⚠️ Live quote for {} is unavailable right now.", term.display_name())
            }
            FetchError::SeriesUnavailable(term, _) => {
                format!("⚠️ Yield history for {} is unavailable right now.", term.display_name())
            }
            FetchError::Timeout(term) => {
                format!("⚠️ Data source for {} timed out.", term.display_name())
            }
            FetchError::TransportError(term, _) => {
                format!("⚠️ Could not reach the data source for {}.", term.display_name())
            }
            FetchError::Parse(_) => "⚠️ Data source returned an unreadable document.".to_string(),
            FetchError::Render(_) => "⚠️ Chart could not be generated.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliverError {
    /// No destination mapped for the term; callers treat this as a no-op
    #[error("no destination set for {0}")]
    DestinationUnset(Term),
    #[error("delivery failed: {0}")]
    SendFailed(String),
}

/// Longest notice body a destination will accept
pub const MAX_NOTICE_LEN: usize = 2000;

/// Trim an error message down to something that fits in a plain-text notice
pub fn clean_notice(error_msg: &str) -> String {
    let trimmed = error_msg.trim();
    if trimmed.chars().count() <= MAX_NOTICE_LEN {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_NOTICE_LEN - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_notice_truncates_long_messages() {
        let long = "x".repeat(MAX_NOTICE_LEN + 50);
        let cleaned = clean_notice(&long);
        assert_eq!(cleaned.chars().count(), MAX_NOTICE_LEN);
        assert!(cleaned.ends_with('…'));
        assert_eq!(clean_notice("  short  "), "short");
    }

    #[test]
    fn test_notice_text_hides_transport_details() {
        let err = FetchError::TransportError(Term::TenYear, "tcp connect error 10.0.0.1".to_string());
        let notice = err.notice_text();
        assert!(notice.contains("10-Year"));
        assert!(!notice.contains("10.0.0.1"));
    }
}
