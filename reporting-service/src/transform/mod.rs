use std::{collections::BTreeSet, fmt};

use loading_client::domain::{iso_date, Entry};
use serde::Deserialize;
use time::{Date, Duration};

use crate::pipeline::ReportError;

/// Inclusive calendar-date range. `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: Date,
    to: Date,
}

impl DateRange {
    pub fn new(from: Date, to: Date) -> Result<Self, ReportError> {
        if from > to {
            return Err(ReportError::InvalidRange {
                from: iso_date(from),
                to: iso_date(to),
            });
        }
        Ok(Self { from, to })
    }

    /// `today - days ..= today`.
    pub fn last_days(today: Date, days: u16) -> Self {
        let from = today
            .checked_sub(Duration::days(i64::from(days)))
            .unwrap_or(Date::MIN);
        Self { from, to: today }
    }

    /// First day of the current month through `today`.
    pub fn month_to_date(today: Date) -> Self {
        let from = today.replace_day(1).unwrap_or(today);
        Self { from, to: today }
    }

    pub fn start(&self) -> Date {
        self.from
    }

    pub fn end(&self) -> Date {
        self.to
    }

    pub fn from_key(&self) -> String {
        iso_date(self.from)
    }

    pub fn to_key(&self) -> String {
        iso_date(self.to)
    }

    pub fn contains(&self, date: Date) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from_key(), self.to_key())
    }
}

/// How the initial range is chosen when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRange {
    #[default]
    Last30Days,
    MonthToDate,
}

impl DefaultRange {
    pub fn resolve(self, today: Date) -> DateRange {
        match self {
            Self::Last30Days => DateRange::last_days(today, 30),
            Self::MonthToDate => DateRange::month_to_date(today),
        }
    }
}

/// The active report criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub range: DateRange,
    station: Option<String>,
}

impl ReportFilter {
    pub fn new(range: DateRange, station: Option<String>) -> Self {
        Self {
            range,
            station: normalize_station(station),
        }
    }

    pub fn station(&self) -> Option<&str> {
        self.station.as_deref()
    }

    pub fn with_station(mut self, station: Option<String>) -> Self {
        self.station = normalize_station(station);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.range.contains(entry.date) {
            return false;
        }
        match &self.station {
            Some(station) => entry.station.as_deref() == Some(station.as_str()),
            None => true,
        }
    }
}

// A blank selection in the station picker means "all stations".
fn normalize_station(station: Option<String>) -> Option<String> {
    station.filter(|s| !s.trim().is_empty())
}

/// Entries matching `filter`, ascending by date. Same-day entries keep their
/// input order.
pub fn filter_entries(entries: &[Entry], filter: &ReportFilter) -> Vec<Entry> {
    let mut selected: Vec<Entry> = entries.iter().filter(|e| filter.matches(e)).cloned().collect();
    selected.sort_by_key(|e| e.date);
    selected
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub entry_count: usize,
    /// Distinct stations; entries without a station are not counted.
    pub station_count: usize,
    /// Feeder readings across all entries (not distinct feeders).
    pub feeder_count: usize,
}

pub fn summarize(entries: &[Entry]) -> ReportStats {
    let stations: BTreeSet<&str> = entries.iter().filter_map(|e| e.station.as_deref()).collect();
    ReportStats {
        entry_count: entries.len(),
        station_count: stations.len(),
        feeder_count: entries.iter().map(Entry::feeder_count).sum(),
    }
}

/// Sorted distinct station names, for populating the station picker.
pub fn station_options(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.station.clone())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
