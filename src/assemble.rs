//! Joins live reports against the schedule into a GTFS-RT snapshot.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ReportError;
use crate::gtfs_rt::{
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, TripUpdate, VehicleDescriptor,
    VehiclePosition, feed_header::Incrementality,
};
use crate::report::{BusReport, RawBusReport};
use crate::schedule::{ScheduleIndex, ScheduleTrip};

pub const GTFS_REALTIME_VERSION: &str = "2.0";

/// Result of one assembly pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub feed: FeedMessage,
    /// Reports left out of the feed, with their position in the input.
    pub skipped: Vec<(usize, ReportError)>,
}

/// Builds a full-dataset snapshot stamped with `built_at`.
///
/// Reports are the raw elements of the API's `data` array, visited once in
/// input order. A report that fails decoding or validation, or has no
/// scheduled trip, is skipped with a warning; every other report becomes an
/// entity whose id is its index among the matched reports.
pub fn assemble(
    index: &ScheduleIndex,
    reports: &[Value],
    tz: Tz,
    built_at: DateTime<Utc>,
) -> Assembly {
    let mut feed = FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
            incrementality: Some(Incrementality::FullDataset as i32),
            timestamp: u64::try_from(built_at.timestamp()).ok(),
            feed_version: None,
        },
        entity: Vec::with_capacity(reports.len()),
    };
    let mut skipped = Vec::new();

    for (position, raw) in reports.iter().enumerate() {
        let matched = RawBusReport::from_value(raw).and_then(|report| {
            let report = report.normalize(tz)?;
            let trip = index.lookup(report.line_nr, report.connection_no)?;
            Ok((report, trip))
        });

        match matched {
            Ok((report, trip)) => {
                let id = feed.entity.len().to_string();
                feed.entity.push(build_entity(id, &report, trip));
            }
            Err(e) => {
                let vid = raw.get("vid").unwrap_or(&Value::Null);
                warn!(position, %vid, error = %e, "Skipping bus report");
                skipped.push((position, e));
            }
        }
    }

    debug!(
        entities = feed.entity.len(),
        skipped = skipped.len(),
        "Feed assembled"
    );

    Assembly { feed, skipped }
}

fn build_entity(id: String, report: &BusReport, trip: &ScheduleTrip) -> FeedEntity {
    let trip_descriptor = TripDescriptor {
        trip_id: Some(trip.trip_id.clone()),
        route_id: Some(trip.route_id.clone()),
        ..Default::default()
    };
    let vehicle_descriptor = VehicleDescriptor {
        id: Some(report.vehicle_id.clone()),
        ..Default::default()
    };

    FeedEntity {
        id,
        vehicle: Some(VehiclePosition {
            trip: Some(trip_descriptor.clone()),
            vehicle: Some(vehicle_descriptor.clone()),
            position: Some(Position {
                latitude: report.latitude as f32,
                longitude: report.longitude as f32,
                bearing: report.bearing.map(|b| b as f32),
                ..Default::default()
            }),
            ..Default::default()
        }),
        trip_update: Some(TripUpdate {
            trip: trip_descriptor,
            vehicle: Some(vehicle_descriptor),
            timestamp: u64::try_from(report.observed_at).ok(),
            delay: Some(report.delay_secs),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Prague;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tracing::Level;
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    /// Records the level of every event it sees.
    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

    impl<S: tracing::Subscriber> Layer<S> for LevelRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    fn index() -> ScheduleIndex {
        let trips = ["X100 5", "X100 6", "X207 1"]
            .iter()
            .enumerate()
            .map(|(i, short_name)| ScheduleTrip {
                route_id: format!("R{i}"),
                trip_id: format!("T{i}"),
                trip_short_name: short_name.to_string(),
                service_id: "S1".to_string(),
            });
        ScheduleIndex::build("X", trips).unwrap()
    }

    fn report(line_name: &str, connection_no: &str, delay: &str) -> Value {
        json!({
            "line_name": line_name,
            "connection_no": connection_no,
            "state_dtime": "2024-01-01 08:00:00",
            "time_difference": delay,
            "vid": format!("V{line_name}-{connection_no}"),
            "gps_latitude": 50.0,
            "gps_longitude": 14.0,
            "gps_course": 90
        })
    }

    fn built_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 5).unwrap()
    }

    #[test]
    fn test_header() {
        let assembly = assemble(&index(), &[], Prague, built_at());

        assert_eq!(assembly.feed.header.gtfs_realtime_version, "2.0");
        assert_eq!(assembly.feed.header.timestamp, Some(1704092405));
        assert_eq!(
            assembly.feed.header.incrementality,
            Some(Incrementality::FullDataset as i32)
        );
        assert!(assembly.feed.entity.is_empty());
        assert!(assembly.skipped.is_empty());
    }

    #[test]
    fn test_single_match() {
        let assembly = assemble(&index(), &[report("100", "5", "00:02:00")], Prague, built_at());

        assert_eq!(assembly.feed.entity.len(), 1);
        let entity = &assembly.feed.entity[0];
        assert_eq!(entity.id, "0");

        let update = entity.trip_update.as_ref().unwrap();
        assert_eq!(update.trip.trip_id.as_deref(), Some("T0"));
        assert_eq!(update.trip.route_id.as_deref(), Some("R0"));
        assert_eq!(update.delay, Some(120));
        assert_eq!(update.timestamp, Some(1704092400));
        assert_eq!(update.vehicle.as_ref().unwrap().id.as_deref(), Some("V100-5"));

        let vehicle = entity.vehicle.as_ref().unwrap();
        let position = vehicle.position.as_ref().unwrap();
        assert_eq!(position.latitude, 50.0);
        assert_eq!(position.longitude, 14.0);
        assert_eq!(position.bearing, Some(90.0));
        assert_eq!(vehicle.trip.as_ref().unwrap().trip_id.as_deref(), Some("T0"));
    }

    #[test]
    fn test_unmatched_and_malformed_are_skipped_in_order() {
        let reports = [
            report("999", "1", ""),
            report("207", "1", "-00:01:00"),
            report("100", "5", "bad"),
            report("100", "6", ""),
            report("100", "7", ""),
        ];

        let assembly = assemble(&index(), &reports, Prague, built_at());

        let ids: Vec<_> = assembly.feed.entity.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["0", "1"]);

        let trips: Vec<_> = assembly
            .feed
            .entity
            .iter()
            .map(|e| e.trip_update.as_ref().unwrap().trip.trip_id.clone().unwrap())
            .collect();
        assert_eq!(trips, ["T2", "T1"]);
        assert_eq!(assembly.feed.entity[0].trip_update.as_ref().unwrap().delay, Some(-60));

        assert_eq!(
            assembly.skipped,
            vec![
                (
                    0,
                    ReportError::NotFound {
                        line_nr: 999,
                        connection_no: 1
                    }
                ),
                (2, ReportError::MalformedDelay("bad".to_string())),
                (
                    4,
                    ReportError::NotFound {
                        line_nr: 100,
                        connection_no: 7
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let reports = [report("100", "5", "00:00:10"), report("100", "6", "")];
        let index = index();

        let first = assemble(&index, &reports, Prague, built_at());
        let mut second = assemble(&index, &reports, Prague, Utc::now());
        second.feed.header.timestamp = first.feed.header.timestamp;

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_bearing() {
        let mut raw = report("100", "5", "");
        raw["gps_course"] = Value::Null;

        let assembly = assemble(&index(), &[raw], Prague, built_at());
        let vehicle = assembly.feed.entity[0].vehicle.as_ref().unwrap();
        assert_eq!(vehicle.position.as_ref().unwrap().bearing, None);
    }

    #[test]
    fn test_undecodable_report_is_skipped() {
        let mut bad = report("100", "6", "");
        bad["gps_latitude"] = Value::Null;

        let assembly = assemble(&index(), &[bad, report("100", "5", "")], Prague, built_at());

        assert_eq!(assembly.feed.entity.len(), 1);
        assert_eq!(assembly.feed.entity[0].id, "0");
        assert_eq!(assembly.skipped.len(), 1);
        assert!(matches!(
            assembly.skipped[0],
            (0, ReportError::MalformedReport(_))
        ));
    }

    #[test]
    fn test_assembly_logs_below_info() {
        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let reports = [report("100", "5", ""), report("999", "1", "")];

        tracing::subscriber::with_default(subscriber, || {
            assemble(&index(), &reports, Prague, built_at());
        });

        let levels = recorder.0.lock().unwrap();
        assert_eq!(levels.as_slice(), [Level::WARN, Level::DEBUG]);
    }
}
