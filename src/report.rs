//! Live vehicle reports from the MHD API and their normalization.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::ReportError;

static DELAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>-)?(?P<hours>[0-9]{2}):(?P<minutes>[0-9]{2}):(?P<seconds>[0-9]{2})$")
        .expect("delay pattern is valid")
});

const STATE_DTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of the `data` array returned by `POST /buses`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBusReport {
    #[serde(deserialize_with = "string_or_number")]
    pub line_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub connection_no: String,
    pub state_dtime: String,
    /// Signed `HH:MM:SS`; missing, `null` and empty all mean on time.
    #[serde(default)]
    pub time_difference: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub vid: String,
    pub gps_latitude: f64,
    pub gps_longitude: f64,
    #[serde(default)]
    pub gps_course: Option<f64>,
}

/// A report that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct BusReport {
    pub vehicle_id: String,
    pub line_nr: u32,
    pub connection_no: u32,
    /// Observation time in epoch seconds.
    pub observed_at: i64,
    /// Seconds behind schedule; negative when early.
    pub delay_secs: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f64>,
}

impl RawBusReport {
    /// Reads one element of the `data` array. Elements with missing or
    /// mistyped fields are rejected individually.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ReportError> {
        Self::deserialize(value).map_err(|e| ReportError::MalformedReport(e.to_string()))
    }

    /// Validates the report, reading `state_dtime` as civil time in `tz`.
    pub fn normalize(&self, tz: Tz) -> Result<BusReport, ReportError> {
        let delay_secs = parse_delay(self.time_difference.as_deref().unwrap_or_default())?;

        Ok(BusReport {
            vehicle_id: self.vid.clone(),
            line_nr: parse_number("line_name", &self.line_name)?,
            connection_no: parse_number("connection_no", &self.connection_no)?,
            observed_at: parse_observed_at(&self.state_dtime, tz)?,
            delay_secs,
            latitude: self.gps_latitude,
            longitude: self.gps_longitude,
            bearing: self.gps_course,
        })
    }
}

/// Parses a signed `HH:MM:SS` delay into seconds. An empty string is zero.
///
/// ```
/// use mhd_gtfs_rt::report::parse_delay;
///
/// assert_eq!(parse_delay("00:05:30"), Ok(330));
/// assert_eq!(parse_delay("-00:05:30"), Ok(-330));
/// assert_eq!(parse_delay(""), Ok(0));
/// assert!(parse_delay("bad").is_err());
/// ```
pub fn parse_delay(raw: &str) -> Result<i32, ReportError> {
    if raw.is_empty() {
        return Ok(0);
    }

    let caps = DELAY_RE
        .captures(raw)
        .ok_or_else(|| ReportError::MalformedDelay(raw.to_string()))?;

    let part = |name: &str| -> Result<i32, ReportError> {
        caps[name]
            .parse()
            .map_err(|_| ReportError::MalformedDelay(raw.to_string()))
    };

    let total = part("hours")? * 3600 + part("minutes")? * 60 + part("seconds")?;

    Ok(if caps.name("sign").is_some() { -total } else { total })
}

/// Parses `YYYY-MM-DD HH:MM:SS` as local time in `tz` into epoch seconds.
///
/// Ambiguous local times (clocks going back) resolve to the earlier instant.
/// Times skipped by a DST jump are rejected.
pub fn parse_observed_at(raw: &str, tz: Tz) -> Result<i64, ReportError> {
    let naive = NaiveDateTime::parse_from_str(raw, STATE_DTIME_FORMAT)
        .map_err(|_| ReportError::MalformedTimestamp(raw.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| ReportError::MalformedTimestamp(raw.to_string()))
}

fn parse_number(field: &'static str, raw: &str) -> Result<u32, ReportError> {
    raw.trim().parse().map_err(|_| ReportError::MalformedNumber {
        field,
        value: raw.to_string(),
    })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Text(s) => s,
        Field::Number(n) => n.to_string(),
    })
}
