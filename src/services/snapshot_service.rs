use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{ChangeDirection, QuoteSnapshot, QuoteStats, NOT_AVAILABLE};
use crate::utils::ParseError;

lazy_static! {
    static ref STANDARD_SELECTORS: QuoteSelectors = QuoteSelectors::from_css(
        ".QuoteStrip-lastPrice",
        ".QuoteStrip-changeDown",
        ".QuoteStrip-changeUp",
        ".Summary-stat",
        ".Summary-label",
        ".Summary-value",
        ".QuoteStrip-lastTradeTime",
    )
    .expect("standard quote selectors are valid CSS");
}

/// CSS selectors locating each quote field on the page
#[derive(Debug, Clone)]
pub struct QuoteSelectors {
    last_price: Selector,
    change_down: Selector,
    change_up: Selector,
    summary_stat: Selector,
    stat_label: Selector,
    stat_value: Selector,
    last_trade_time: Selector,
}

impl QuoteSelectors {
    pub fn from_css(
        last_price: &str,
        change_down: &str,
        change_up: &str,
        summary_stat: &str,
        stat_label: &str,
        stat_value: &str,
        last_trade_time: &str,
    ) -> Result<Self, String> {
        let compile = |css: &str| {
            Selector::parse(css).map_err(|e| format!("Invalid selector '{}': {}", css, e))
        };

        Ok(Self {
            last_price: compile(last_price)?,
            change_down: compile(change_down)?,
            change_up: compile(change_up)?,
            summary_stat: compile(summary_stat)?,
            stat_label: compile(stat_label)?,
            stat_value: compile(stat_value)?,
            last_trade_time: compile(last_trade_time)?,
        })
    }
}

impl Default for QuoteSelectors {
    fn default() -> Self {
        STANDARD_SELECTORS.clone()
    }
}

/// Collapse an element's text nodes into one whitespace-normalized string
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of the first match, `None` when nothing matches or the match is blank
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Extract a quote snapshot from a live quote page.
///
/// Missing fields degrade to `N/A`. The down indicator is checked before the
/// up indicator, so a page carrying both reports a downward move.
pub fn extract_snapshot(html: &str, selectors: &QuoteSelectors) -> Result<QuoteSnapshot, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::MalformedMarkup("empty document".to_string()));
    }

    let document = Html::parse_document(html);
    let root = document.root_element();

    let last_price = first_text(root, &selectors.last_price)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let (change_direction, change_text) = if let Some(text) = first_text(root, &selectors.change_down) {
        (ChangeDirection::Down, text)
    } else if let Some(text) = first_text(root, &selectors.change_up) {
        (ChangeDirection::Up, text)
    } else {
        (ChangeDirection::Unknown, NOT_AVAILABLE.to_string())
    };

    let mut stats = QuoteStats::new();
    for stat in root.select(&selectors.summary_stat) {
        let label = first_text(stat, &selectors.stat_label);
        let value = first_text(stat, &selectors.stat_value);
        match (label, value) {
            (Some(label), Some(value)) => stats.insert(label, value),
            (Some(label), None) => stats.insert(label, NOT_AVAILABLE.to_string()),
            (None, _) => debug!("Skipping summary stat without a label"),
        }
    }

    let last_trade_time = first_text(root, &selectors.last_trade_time)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    debug!(
        "Extracted quote: last={} change={} ({:?}) stats={}",
        last_price,
        change_text,
        change_direction,
        stats.len()
    );

    Ok(QuoteSnapshot {
        last_price,
        change_text,
        change_direction,
        stats,
        last_trade_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_PAGE: &str = r#"
        <html><body>
          <div class="QuoteStrip-lastPrice">4.215%</div>
          <div class="QuoteStrip-changeUp"><span> +0.031 </span></div>
          <div class="QuoteStrip-lastTradeTime">Last | 4:59 PM EDT</div>
          <ul>
            <li class="Summary-stat"><span class="Summary-label">Open</span><span class="Summary-value">4.184%</span></li>
            <li class="Summary-stat"><span class="Summary-label">Day High</span><span class="Summary-value">4.231%</span></li>
            <li class="Summary-stat"><span class="Summary-label">Open</span><span class="Summary-value">4.190%</span></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_extracts_all_fields() {
        let snapshot = extract_snapshot(QUOTE_PAGE, &QuoteSelectors::default()).unwrap();

        assert_eq!(snapshot.last_price, "4.215%");
        assert_eq!(snapshot.change_direction, ChangeDirection::Up);
        assert_eq!(snapshot.change_text, "+0.031");
        assert_eq!(snapshot.last_trade_time, "Last | 4:59 PM EDT");
        assert_eq!(snapshot.stats.len(), 2);
        assert_eq!(snapshot.stats.get("Open"), Some("4.190%"));
        assert_eq!(snapshot.stats.get("Day High"), Some("4.231%"));
    }

    #[test]
    fn test_missing_indicators_degrade_to_unknown() {
        let html = r#"<html><body><div class="QuoteStrip-lastPrice">4.1%</div></body></html>"#;
        let snapshot = extract_snapshot(html, &QuoteSelectors::default()).unwrap();

        assert_eq!(snapshot.change_direction, ChangeDirection::Unknown);
        assert_eq!(snapshot.change_text, NOT_AVAILABLE);
        assert_eq!(snapshot.last_trade_time, NOT_AVAILABLE);
        assert!(snapshot.stats.is_empty());
    }

    #[test]
    fn test_down_indicator_wins_over_up() {
        let html = r#"<html><body>
            <div class="QuoteStrip-changeUp">+0.010</div>
            <div class="QuoteStrip-changeDown">-0.020</div>
        </body></html>"#;
        let snapshot = extract_snapshot(html, &QuoteSelectors::default()).unwrap();

        assert_eq!(snapshot.change_direction, ChangeDirection::Down);
        assert_eq!(snapshot.change_text, "-0.020");
        assert_eq!(snapshot.last_price, NOT_AVAILABLE);
    }

    #[test]
    fn test_blank_elements_degrade_to_not_available() {
        let html = r#"<html><body>
            <div class="QuoteStrip-lastPrice">   </div>
            <div class="QuoteStrip-changeDown"></div>
            <div class="QuoteStrip-changeUp">+0.004</div>
            <li class="Summary-stat"><span class="Summary-label">Open</span><span class="Summary-value"> </span></li>
            <li class="Summary-stat"><span class="Summary-label"></span><span class="Summary-value">x</span></li>
        </body></html>"#;
        let snapshot = extract_snapshot(html, &QuoteSelectors::default()).unwrap();

        assert_eq!(snapshot.last_price, NOT_AVAILABLE);
        assert_eq!(snapshot.change_direction, ChangeDirection::Up);
        assert_eq!(snapshot.change_text, "+0.004");
        assert_eq!(snapshot.stats.len(), 1);
        assert_eq!(snapshot.stats.get("Open"), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_blank_document_is_malformed() {
        let result = extract_snapshot("   \n ", &QuoteSelectors::default());
        assert!(matches!(result, Err(ParseError::MalformedMarkup(_))));
    }

    #[test]
    fn test_custom_selectors() {
        let selectors = QuoteSelectors::from_css("#px", "#dn", "#up", ".s", ".l", ".v", "#t").unwrap();
        let html = r#"<p id="px">3.9</p><p id="t">close</p>"#;
        let snapshot = extract_snapshot(html, &selectors).unwrap();
        assert_eq!(snapshot.last_price, "3.9");
        assert_eq!(snapshot.last_trade_time, "close");

        assert!(QuoteSelectors::from_css("##", "a", "a", "a", "a", "a", "a").is_err());
    }
}
