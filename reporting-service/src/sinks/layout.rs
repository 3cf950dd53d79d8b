use std::{collections::BTreeMap, fmt, str::FromStr};

use loading_client::domain::{display_date, Entry, Measurement};
use serde::Deserialize;
use time::Date;

/// Shown for any value the entry did not record.
pub const PLACEHOLDER: &str = "-";

/// The two report layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportView {
    /// One row per (entry, feeder): "Monthly Loading Details".
    #[default]
    Monthly,
    /// One row per station: "Daily Loading Summary".
    Daily,
}

const MONTHLY_HEADERS: [&str; 18] = [
    "Date",
    "Circle",
    "Division",
    "PSS",
    "Equipment",
    "PTR No.",
    "Max V (kV)",
    "Date",
    "Time",
    "Min V (kV)",
    "Date",
    "Time",
    "Max I (A)",
    "Date",
    "Time",
    "Min I (A)",
    "Date",
    "Time",
];

const MONTHLY_WIDTHS: [f64; 18] = [
    12.0, 8.0, 10.0, 15.0, 20.0, 8.0, 12.0, 12.0, 10.0, 12.0, 12.0, 10.0, 12.0, 12.0, 10.0, 12.0,
    12.0, 10.0,
];

const DAILY_HEADERS: [&str; 5] = ["PSS Station", "Entries", "Feeder Readings", "First Date", "Last Date"];

const DAILY_WIDTHS: [f64; 5] = [20.0, 10.0, 16.0, 12.0, 12.0];

impl ReportView {
    pub fn title(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly Loading Details",
            Self::Daily => "Daily Loading Summary",
        }
    }

    /// Stem of the exported file name, e.g. `Monthly_Loading_Details`.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly_Loading_Details",
            Self::Daily => "Daily_Loading_Summary",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Monthly => &MONTHLY_HEADERS,
            Self::Daily => &DAILY_HEADERS,
        }
    }

    pub fn column_widths(self) -> &'static [f64] {
        match self {
            Self::Monthly => &MONTHLY_WIDTHS,
            Self::Daily => &DAILY_WIDTHS,
        }
    }

    /// Columns rendered with emphasis (station and equipment names).
    pub fn is_key_column(self, index: usize) -> bool {
        match self {
            Self::Monthly => index == 3 || index == 4,
            Self::Daily => index == 0,
        }
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Monthly => "monthly",
            Self::Daily => "daily",
        })
    }
}

impl FromStr for ReportView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" | "detail" => Ok(Self::Monthly),
            "daily" | "summary" => Ok(Self::Daily),
            other => Err(format!("unknown report view '{other}' (expected monthly or daily)")),
        }
    }
}

/// A rendered report grid: what the preview shows and what the export writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub view: ReportView,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn headers(&self) -> &'static [&'static str] {
        self.view.headers()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lay out `entries` (already filtered and date-ordered) for `view`.
pub fn build_table(view: ReportView, entries: &[Entry]) -> ReportTable {
    let rows = match view {
        ReportView::Monthly => monthly_rows(entries),
        ReportView::Daily => daily_rows(entries),
    };
    ReportTable { view, rows }
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or(PLACEHOLDER).to_string()
}

fn push_measurement(row: &mut Vec<String>, m: &Measurement) {
    row.push(cell(m.value.as_deref()));
    row.push(cell(m.date.as_deref()));
    row.push(cell(m.time.as_deref()));
}

/// A feeder without a name is labelled by its key rather than the placeholder.
fn monthly_rows(entries: &[Entry]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for entry in entries {
        let date = entry.display_date();
        let station = cell(entry.station.as_deref());

        for (key, feeder) in entry.feeders_in_display_order() {
            let mut row = Vec::with_capacity(MONTHLY_HEADERS.len());
            row.push(date.clone());
            row.push(entry.circle.clone());
            row.push(entry.division.clone());
            row.push(station.clone());
            row.push(feeder.name.clone().unwrap_or_else(|| key.to_string()));
            row.push(cell(feeder.ptr_no.as_deref()));
            for m in feeder.measurements() {
                push_measurement(&mut row, m);
            }
            rows.push(row);
        }
    }
    rows
}

struct StationSummary {
    entries: usize,
    feeders: usize,
    first: Date,
    last: Date,
}

fn daily_rows(entries: &[Entry]) -> Vec<Vec<String>> {
    let mut by_station: BTreeMap<&str, StationSummary> = BTreeMap::new();
    for entry in entries {
        let Some(station) = entry.station.as_deref() else {
            continue;
        };
        by_station
            .entry(station)
            .and_modify(|s| {
                s.entries += 1;
                s.feeders += entry.feeder_count();
                s.first = s.first.min(entry.date);
                s.last = s.last.max(entry.date);
            })
            .or_insert(StationSummary {
                entries: 1,
                feeders: entry.feeder_count(),
                first: entry.date,
                last: entry.date,
            });
    }

    by_station
        .into_iter()
        .map(|(station, s)| {
            vec![
                station.to_string(),
                s.entries.to_string(),
                s.feeders.to_string(),
                display_date(s.first),
                display_date(s.last),
            ]
        })
        .collect()
}
