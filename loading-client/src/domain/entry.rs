use std::collections::BTreeMap;

use time::Date;

use super::feeder_reading::{feeder_key_ordinal, FeederReading};

/// Circle reported when a document carries none.
pub const DEFAULT_CIRCLE: &str = "RKL";
/// Division reported when a document carries none.
pub const DEFAULT_DIVISION: &str = "SED";

/// One daily loading entry for a sub-station.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub date: Date,
    pub station: Option<String>,
    pub circle: String,
    pub division: String,
    pub feeders: BTreeMap<String, FeederReading>,
}

impl Entry {
    /// ISO `YYYY-MM-DD` form of the entry date; the key used for range filtering.
    pub fn date_key(&self) -> String {
        iso_date(self.date)
    }

    /// `DD/MM/YYYY` form used in tables and exports.
    pub fn display_date(&self) -> String {
        display_date(self.date)
    }

    pub fn feeder_count(&self) -> usize {
        self.feeders.len()
    }

    /// Feeders ordered by the numeric suffix of their key (`feeder-2` before
    /// `feeder-10`). Keys with equal suffixes keep lexical order.
    pub fn feeders_in_display_order(&self) -> Vec<(&str, &FeederReading)> {
        let mut feeders: Vec<(&str, &FeederReading)> = self
            .feeders
            .iter()
            .map(|(k, f)| (k.as_str(), f))
            .collect();
        feeders.sort_by_key(|(k, _)| feeder_key_ordinal(k));
        feeders
    }
}

pub fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn display_date(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        date.day(),
        u8::from(date.month()),
        date.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn entry_with_keys(keys: &[&str]) -> Entry {
        Entry {
            id: "e-1".to_string(),
            date: date!(2024 - 01 - 05),
            station: Some("BISRA".to_string()),
            circle: DEFAULT_CIRCLE.to_string(),
            division: DEFAULT_DIVISION.to_string(),
            feeders: keys
                .iter()
                .map(|k| (k.to_string(), FeederReading::default()))
                .collect(),
        }
    }

    #[test]
    fn date_forms() {
        let e = entry_with_keys(&[]);
        assert_eq!(e.date_key(), "2024-01-05");
        assert_eq!(e.display_date(), "05/01/2024");
    }

    #[test]
    fn feeders_sorted_by_numeric_suffix() {
        let e = entry_with_keys(&["feeder-10", "feeder-2", "feeder-1"]);
        let keys: Vec<&str> = e.feeders_in_display_order().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["feeder-1", "feeder-2", "feeder-10"]);
    }

    #[test]
    fn non_numeric_suffix_sorts_first() {
        let e = entry_with_keys(&["feeder-3", "charger", "feeder-x"]);
        let keys: Vec<&str> = e.feeders_in_display_order().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["charger", "feeder-x", "feeder-3"]);
    }
}
