//! Error kinds for the feed builder.
//!
//! [`ReportError`] is per-report and never escapes the assembler.
//! [`ScheduleError`], [`LiveSourceError`] and [`PersistError`] fail a single
//! refresh cycle and are collected into [`CycleError`] at the loop boundary.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("malformed bus report: {0}")]
    MalformedReport(String),

    #[error("could not determine bus delay from {0:?}")]
    MalformedDelay(String),

    #[error("invalid observation time {0:?}")]
    MalformedTimestamp(String),

    #[error("invalid {field} {value:?}")]
    MalformedNumber { field: &'static str, value: String },

    #[error("trip for line_name={line_nr} and connection_no={connection_no} not found in GTFS feed")]
    NotFound { line_nr: u32, connection_no: u32 },
}

#[derive(thiserror::Error, Debug)]
pub enum ScheduleError {
    #[error("cannot read schedule: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("schedule line {line}: {reason}")]
    Schema { line: u64, reason: String },

    #[error("trip {trip}: trip_short_name {short_name:?} is not \"<line> <run>\" after prefix {prefix:?}")]
    TripKey {
        trip: usize,
        short_name: String,
        prefix: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LiveSourceError {
    #[error("invalid API URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Deserialize error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("cannot write snapshot to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error("schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("live source: {0}")]
    Transport(#[from] LiveSourceError),

    #[error("output: {0}")]
    Persist(#[from] PersistError),
}
