//! Static schedule loading and the (line, run) trip index.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{ReportError, ScheduleError};

/// Identity of one scheduled run, as read from GTFS `trips.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTrip {
    pub route_id: String,
    pub trip_id: String,
    pub trip_short_name: String,
    pub service_id: String,
}

/// Reads trips from CSV. The header row is skipped and columns are taken by
/// position: route_id, service_id, trip_id, (ignored), trip_short_name.
pub fn read_trips<R: Read>(reader: R) -> Result<Vec<ScheduleTrip>, ScheduleError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut trips = Vec::new();

    for result in rdr.records() {
        let record = result?;

        if record.len() < 5 {
            return Err(ScheduleError::Schema {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                reason: format!("expected at least 5 columns, found {}", record.len()),
            });
        }

        trips.push(ScheduleTrip {
            route_id: record[0].to_string(),
            service_id: record[1].to_string(),
            trip_id: record[2].to_string(),
            trip_short_name: record[4].to_string(),
        });
    }

    Ok(trips)
}

/// Opens `path` and reads its trips with [`read_trips`].
pub fn load_trips(path: &Path) -> Result<Vec<ScheduleTrip>, ScheduleError> {
    let file = File::open(path)?;
    read_trips(file)
}

/// Lookup from `(line number, run number)` to the scheduled trip.
///
/// Keys come from `trip_short_name` with the operator prefix stripped, e.g.
/// `"6550100 5"` with prefix `"6550"` becomes `(100, 5)`. When two trips
/// share a key the later one wins.
#[derive(Debug, Default)]
pub struct ScheduleIndex {
    trips: HashMap<(u32, u32), ScheduleTrip>,
}

impl ScheduleIndex {
    /// Builds the index. A short name that does not yield a key fails the
    /// whole build, since it means the schedule does not match the expected
    /// format; the error names the trip by its 1-based position in `trips`.
    pub fn build<I>(line_nr_prefix: &str, trips: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = ScheduleTrip>,
    {
        let mut index = HashMap::new();

        for (ordinal, trip) in trips.into_iter().enumerate() {
            let Some(key) = trip_key(line_nr_prefix, &trip.trip_short_name) else {
                return Err(ScheduleError::TripKey {
                    trip: ordinal + 1,
                    short_name: trip.trip_short_name,
                    prefix: line_nr_prefix.to_string(),
                });
            };

            if let Some(previous) = index.insert(key, trip) {
                debug!(
                    line_nr = key.0,
                    connection_no = key.1,
                    replaced_trip_id = %previous.trip_id,
                    "Duplicate schedule key"
                );
            }
        }

        Ok(Self { trips: index })
    }

    /// Loads `path` and builds the index from it.
    pub fn from_path(line_nr_prefix: &str, path: &Path) -> Result<Self, ScheduleError> {
        Self::build(line_nr_prefix, load_trips(path)?)
    }

    pub fn lookup(&self, line_nr: u32, connection_no: u32) -> Result<&ScheduleTrip, ReportError> {
        self.trips
            .get(&(line_nr, connection_no))
            .ok_or(ReportError::NotFound {
                line_nr,
                connection_no,
            })
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

fn trip_key(prefix: &str, short_name: &str) -> Option<(u32, u32)> {
    let rest = short_name.strip_prefix(prefix).unwrap_or(short_name);

    let parts: Vec<&str> = rest.split(' ').collect();
    let [line_nr, connection_no] = parts.as_slice() else {
        return None;
    };

    Some((
        line_nr.trim().parse().ok()?,
        connection_no.trim().parse().ok()?,
    ))
}
