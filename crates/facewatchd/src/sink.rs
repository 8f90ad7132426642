//! Detection event sink: log row per face, snapshot per unknown face.

use crate::snapshot::SnapshotWriter;
use crate::store::{EventStore, StoreError, LOG_TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use facewatch_core::UNKNOWN_LABEL;
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("detection log: {0}")]
    Store(#[from] StoreError),
}

/// Wall-clock source for event timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// What one `record` call persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub event_id: i64,
    pub snapshot: Option<PathBuf>,
}

/// Persists one detection event per observed face.
pub trait EventSink {
    /// Make the sink ready to record (schema present, directories created).
    fn prepare(&mut self) -> Result<(), SinkError>;

    /// Record one labelled face. `crop` is the face region, `None` when it
    /// has zero area or was not taken.
    ///
    /// Failing to persist the event is an error; failing to write the
    /// snapshot is not.
    fn record(&mut self, label: &str, crop: Option<&RgbImage>) -> Result<Recorded, SinkError>;

    /// Flush and close the underlying store.
    fn close(self) -> Result<(), SinkError>
    where
        Self: Sized;
}

/// [`EventSink`] over the SQLite log and the snapshot directory.
pub struct EventRecorder<C = SystemClock> {
    store: EventStore,
    snapshots: SnapshotWriter,
    clock: C,
}

impl EventRecorder<SystemClock> {
    pub fn new(store: EventStore, snapshots: SnapshotWriter) -> Self {
        Self::with_clock(store, snapshots, SystemClock)
    }
}

impl<C: Clock> EventRecorder<C> {
    pub fn with_clock(store: EventStore, snapshots: SnapshotWriter, clock: C) -> Self {
        Self { store, snapshots, clock }
    }

    fn save_snapshot(&self, crop: &RgbImage) -> Option<PathBuf> {
        match self.snapshots.write(crop, self.clock.now()) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot not saved; logging detection anyway");
                None
            }
        }
    }
}

impl<C: Clock> EventSink for EventRecorder<C> {
    fn prepare(&mut self) -> Result<(), SinkError> {
        self.store.ensure_schema()?;
        Ok(())
    }

    fn record(&mut self, label: &str, crop: Option<&RgbImage>) -> Result<Recorded, SinkError> {
        let snapshot = match crop {
            Some(crop) if label == UNKNOWN_LABEL => self.save_snapshot(crop),
            _ => None,
        };

        let timestamp = self.clock.now().format(LOG_TIMESTAMP_FORMAT).to_string();
        let event_id = self.store.append(label, &timestamp)?;
        tracing::info!(
            event_id,
            name = label,
            %timestamp,
            snapshot = snapshot.is_some(),
            "face logged"
        );

        Ok(Recorded { event_id, snapshot })
    }

    fn close(self) -> Result<(), SinkError> {
        self.store.close()?;
        Ok(())
    }
}

#[cfg(test)]
impl<C> EventRecorder<C> {
    pub(crate) fn store(&self) -> &EventStore {
        &self.store
    }
}
