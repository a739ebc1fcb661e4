//! Live quote snapshot models

/// Placeholder for any quote field the page did not carry
pub const NOT_AVAILABLE: &str = "N/A";

/// Direction of the latest change shown on the quote page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Up,
    Down,
    Unknown,
}

impl ChangeDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            ChangeDirection::Up => "▲",
            ChangeDirection::Down => "▼",
            ChangeDirection::Unknown => "•",
        }
    }
}

/// Summary stats keyed by label, kept in the order labels first appeared.
/// Inserting an existing label replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteStats {
    entries: Vec<(String, String)>,
}

impl QuoteStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: String, value: String) {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }
}

/// A point-in-time reading of one instrument's quote page
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    pub last_price: String,
    pub change_text: String,
    pub change_direction: ChangeDirection,
    pub stats: QuoteStats,
    pub last_trade_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_overwrite_keeps_first_position() {
        let mut stats = QuoteStats::new();
        stats.insert("Open".to_string(), "4.01%".to_string());
        stats.insert("Day High".to_string(), "4.12%".to_string());
        stats.insert("Open".to_string(), "4.03%".to_string());

        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("Open"), Some("4.03%"));
        let labels: Vec<&str> = stats.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Open", "Day High"]);
    }
}
