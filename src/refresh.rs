//! The periodic fetch → assemble → persist loop.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{error, info};

use crate::assemble::{Assembly, assemble};
use crate::error::CycleError;
use crate::fetch::LiveSource;
use crate::output::SnapshotSink;
use crate::schedule::ScheduleIndex;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// GTFS `trips.txt`, re-read on every cycle.
    pub trips_path: PathBuf,
    /// Stripped from `trip_short_name` before reading line and run numbers.
    pub line_nr_prefix: String,
    /// Zone of the API's `state_dtime` values.
    pub timezone: Tz,
    /// Pause after each cycle, regardless of how long the cycle took.
    pub interval: Duration,
}

pub struct RefreshLoop<L, S> {
    settings: RefreshSettings,
    source: L,
    sink: S,
}

impl<L: LiveSource, S: SnapshotSink> RefreshLoop<L, S> {
    pub fn new(settings: RefreshSettings, source: L, sink: S) -> Self {
        Self {
            settings,
            source,
            sink,
        }
    }

    pub fn source(&self) -> &L {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs one cycle. The schedule index is rebuilt from disk each time so
    /// schedule updates are picked up without a restart.
    #[tracing::instrument(skip(self), fields(trips = %self.settings.trips_path.display()))]
    pub async fn refresh_once(&self) -> Result<Assembly, CycleError> {
        info!("Refreshing feed");
        let started = Utc::now();

        let index =
            ScheduleIndex::from_path(&self.settings.line_nr_prefix, &self.settings.trips_path)?;
        let reports = self.source.fetch_reports().await?;

        let assembly = assemble(&index, &reports, self.settings.timezone, started);
        self.sink.persist(&assembly.feed)?;

        info!(
            timestamp = started.timestamp(),
            entities = assembly.feed.entity.len(),
            skipped = assembly.skipped.len(),
            scheduled_trips = index.len(),
            "Feed refreshed"
        );

        Ok(assembly)
    }

    /// Refreshes forever, sleeping `interval` after every cycle. A failed
    /// cycle is logged and the loop carries on. `shutdown` is only observed
    /// between cycles; once it resolves the loop returns.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.refresh_once().await {
                error!(error = ?anyhow::Error::new(e), "Could not refresh the feed");
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        info!("Bye");
    }
}
