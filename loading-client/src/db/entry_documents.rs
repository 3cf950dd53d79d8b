use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use crate::domain::{Entry, FeederReading, Measurement, DEFAULT_CIRCLE, DEFAULT_DIVISION};

/// A document as handed out by the store: its id plus the raw field map.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },
    #[error("document {id} has no date")]
    MissingDate { id: String },
    #[error("document {id} has unparseable date '{raw}'")]
    InvalidDate { id: String, raw: String },
}

/// Store-native timestamp, as exported by the document database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StoreTimestamp {
    #[serde(alias = "_seconds")]
    pub seconds: i64,
    #[serde(default, alias = "_nanoseconds")]
    pub nanoseconds: u32,
}

/// The `date` field in any of the shapes found in stored entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Timestamp(StoreTimestamp),
    EpochMillis(i64),
    Text(String),
}

impl RawDate {
    /// Calendar date in UTC, or `None` when the value cannot be read as a date.
    pub fn to_date(&self) -> Option<Date> {
        match self {
            Self::Timestamp(ts) => {
                let nanos = i128::from(ts.seconds) * 1_000_000_000 + i128::from(ts.nanoseconds);
                OffsetDateTime::from_unix_timestamp_nanos(nanos).ok().map(|t| t.date())
            }
            Self::EpochMillis(ms) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(*ms) * 1_000_000)
                    .ok()
                    .map(|t| t.date())
            }
            Self::Text(s) => parse_date_text(s.trim()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Timestamp(ts) => format!("{}s+{}ns", ts.seconds, ts.nanoseconds),
            Self::EpochMillis(ms) => format!("{ms}ms"),
            Self::Text(s) => s.clone(),
        }
    }
}

fn parse_date_text(s: &str) -> Option<Date> {
    if let Ok(d) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Some(d);
    }
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t.to_offset(UtcOffset::UTC).date());
    }
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()
    .map(|t| t.date())
}

/// Top-level shape of a daily entry document.
///
/// Scalar fields are kept as raw JSON and coerced afterwards: older revisions
/// of the entry form stored numbers where newer ones store strings.
#[derive(Debug, Deserialize)]
pub struct EntryDocument {
    #[serde(default)]
    pub date: Option<RawDate>,
    #[serde(default, rename = "pssStation")]
    pub pss_station: Option<Value>,
    #[serde(default)]
    pub station: Option<Value>,
    #[serde(default)]
    pub circle: Option<Value>,
    #[serde(default)]
    pub division: Option<Value>,
    #[serde(default)]
    pub feeders: Option<BTreeMap<String, Map<String, Value>>>,
}

impl EntryDocument {
    /// Decode and normalize a stored document into an [`Entry`].
    pub fn parse(doc: &StoredDocument) -> Result<Entry, DocumentError> {
        let parsed: EntryDocument =
            serde_json::from_value(doc.data.clone()).map_err(|e| DocumentError::Malformed {
                id: doc.id.clone(),
                reason: e.to_string(),
            })?;
        parsed.into_entry(doc.id.clone())
    }

    pub fn into_entry(self, id: String) -> Result<Entry, DocumentError> {
        let raw_date = self
            .date
            .ok_or_else(|| DocumentError::MissingDate { id: id.clone() })?;
        let date = raw_date.to_date().ok_or_else(|| DocumentError::InvalidDate {
            id: id.clone(),
            raw: raw_date.describe(),
        })?;

        let station = self
            .pss_station
            .as_ref()
            .and_then(scalar_text)
            .or_else(|| self.station.as_ref().and_then(scalar_text));

        let feeders = self
            .feeders
            .unwrap_or_default()
            .into_iter()
            .map(|(key, fields)| (key, feeder_from_fields(&fields)))
            .collect();

        Ok(Entry {
            id,
            date,
            station,
            circle: self
                .circle
                .as_ref()
                .and_then(scalar_text)
                .unwrap_or_else(|| DEFAULT_CIRCLE.to_string()),
            division: self
                .division
                .as_ref()
                .and_then(scalar_text)
                .unwrap_or_else(|| DEFAULT_DIVISION.to_string()),
            feeders,
        })
    }
}

/// Render a JSON scalar as display text.
///
/// Empty strings, `null`, `false` and zero count as "not recorded": the entry
/// form writes `0` for readings the operator left blank.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (i != 0).then(|| i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().and_then(format_float)
            }
        }
        Value::Bool(true) => Some("true".to_string()),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn format_float(f: f64) -> Option<String> {
    if f == 0.0 || !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        // Integral values print without a trailing ".0".
        return Some((f as i64).to_string());
    }
    Some(f.to_string())
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(scalar_text)
}

fn measurement(fields: &Map<String, Value>, value: &[&str], date: &[&str], time: &[&str]) -> Measurement {
    Measurement {
        value: first_text(fields, value),
        date: first_text(fields, date),
        time: first_text(fields, time),
    }
}

fn feeder_from_fields(fields: &Map<String, Value>) -> FeederReading {
    FeederReading {
        name: first_text(fields, &["name"]),
        ptr_no: first_text(fields, &["ptrNo"]),
        max_voltage: measurement(
            fields,
            &["maxVoltage"],
            &["maxVoltageDate", "maxVDate"],
            &["maxVoltageTime", "maxVTime"],
        ),
        min_voltage: measurement(
            fields,
            &["minVoltage"],
            &["minVoltageDate", "minVDate"],
            &["minVoltageTime", "minVTime"],
        ),
        max_current: measurement(
            fields,
            &["maxLoad", "maxCurrent"],
            &["maxLoadDate", "maxCurrentDate", "maxIDate"],
            &["maxLoadTime", "maxCurrentTime", "maxITime"],
        ),
        min_current: measurement(
            fields,
            &["minLoad", "minCurrent"],
            &["minLoadDate", "minCurrentDate", "minIDate"],
            &["minLoadTime", "minCurrentTime", "minITime"],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    fn doc(data: Value) -> StoredDocument {
        StoredDocument {
            id: "doc-1".to_string(),
            data,
        }
    }

    #[test]
    fn parses_string_date_and_defaults() {
        let entry = EntryDocument::parse(&doc(json!({
            "date": "2024-01-05",
            "pssStation": "BISRA",
        })))
        .expect("valid document");

        assert_eq!(entry.id, "doc-1");
        assert_eq!(entry.date, date!(2024 - 01 - 05));
        assert_eq!(entry.station.as_deref(), Some("BISRA"));
        assert_eq!(entry.circle, DEFAULT_CIRCLE);
        assert_eq!(entry.division, DEFAULT_DIVISION);
        assert!(entry.feeders.is_empty());
    }

    #[test]
    fn parses_store_timestamp_in_utc() {
        // 2024-01-10T23:30:00Z
        let entry = EntryDocument::parse(&doc(json!({
            "date": { "seconds": 1_704_929_400, "nanoseconds": 0 },
        })))
        .expect("valid document");
        assert_eq!(entry.date, date!(2024 - 01 - 10));

        let exported = EntryDocument::parse(&doc(json!({
            "date": { "_seconds": 1_704_929_400, "_nanoseconds": 5 },
        })))
        .expect("valid document");
        assert_eq!(exported.date, date!(2024 - 01 - 10));
    }

    #[test]
    fn parses_rfc3339_and_naive_datetimes() {
        let offset = RawDate::Text("2024-01-06T02:00:00+05:30".to_string());
        assert_eq!(offset.to_date(), Some(date!(2024 - 01 - 05)));

        let naive = RawDate::Text("2024-01-06T08:15:00".to_string());
        assert_eq!(naive.to_date(), Some(date!(2024 - 01 - 06)));

        let millis = RawDate::EpochMillis(1_704_412_800_000);
        assert_eq!(millis.to_date(), Some(date!(2024 - 01 - 05)));
    }

    #[test]
    fn missing_date_is_rejected() {
        let err = EntryDocument::parse(&doc(json!({ "pssStation": "BISRA" }))).unwrap_err();
        assert_eq!(err, DocumentError::MissingDate { id: "doc-1".to_string() });
    }

    #[test]
    fn unparseable_date_is_rejected() {
        let err = EntryDocument::parse(&doc(json!({ "date": "yesterday" }))).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidDate { ref raw, .. } if raw == "yesterday"));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = EntryDocument::parse(&doc(json!({
            "date": "2024-01-05",
            "feeders": { "feeder-1": 42 },
        })))
        .unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
    }

    #[test]
    fn station_falls_back_to_station_field() {
        let entry = EntryDocument::parse(&doc(json!({
            "date": "2024-01-05",
            "station": "KALUNGA",
        })))
        .expect("valid document");
        assert_eq!(entry.station.as_deref(), Some("KALUNGA"));
    }

    #[test]
    fn feeder_field_revisions_decode_alike() {
        let entry = EntryDocument::parse(&doc(json!({
            "date": "2024-01-05",
            "feeders": {
                "feeder-1": {
                    "name": "Town",
                    "ptrNo": 2,
                    "maxVoltage": 11.4,
                    "maxVDate": "05/01/2024",
                    "maxVTime": "10:00",
                    "maxCurrent": "120",
                    "maxIDate": "05/01/2024",
                },
                "feeder-2": {
                    "maxVoltage": "11.4",
                    "maxVoltageDate": "05/01/2024",
                    "maxVoltageTime": "10:00",
                    "maxLoad": 120,
                    "maxLoadDate": "05/01/2024",
                },
            },
        })))
        .expect("valid document");

        let f1 = &entry.feeders["feeder-1"];
        let f2 = &entry.feeders["feeder-2"];
        assert_eq!(f1.name.as_deref(), Some("Town"));
        assert_eq!(f1.ptr_no.as_deref(), Some("2"));
        assert_eq!(f1.max_voltage, f2.max_voltage);
        assert_eq!(f1.max_current, f2.max_current);
        assert_eq!(f1.max_current.value.as_deref(), Some("120"));
    }

    #[test]
    fn zero_and_blank_readings_are_absent() {
        assert_eq!(scalar_text(&json!(0)), None);
        assert_eq!(scalar_text(&json!(0.0)), None);
        assert_eq!(scalar_text(&json!("  ")), None);
        assert_eq!(scalar_text(&json!(false)), None);
        assert_eq!(scalar_text(&json!(33.0)), Some("33".to_string()));
        assert_eq!(scalar_text(&json!(10.75)), Some("10.75".to_string()));
    }
}
