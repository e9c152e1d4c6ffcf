//! Event timeline synchronizer
//!
//! One driver's events, reconciled against the events service. Events are
//! immutable once created, so there are no derived fields to correct, and
//! the timeline keeps the server's insertion order.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::api::EventsClient;
use crate::error::Result;
use crate::format::{event_date, event_time};
use crate::sync::{DerivedFields, PollHandle, PollOutcome, Poller, RecordSource, Reconciler, SyncState};
use crate::telemetry::LiveTelemetry;
use crate::types::{generate_id, DriverStatus, EventRecord, FieldPatch, DEFAULT_BLOOD_OXYGEN};

/// The events service, scoped to one driver.
#[derive(Debug, Clone)]
pub struct TimelineSource {
    events: EventsClient,
    driver_id: String,
}

impl TimelineSource {
    pub fn new(events: EventsClient, driver_id: impl Into<String>) -> Self {
        Self {
            events,
            driver_id: driver_id.into(),
        }
    }
}

impl RecordSource for TimelineSource {
    type Record = EventRecord;

    async fn fetch_all(&self) -> Result<Vec<EventRecord>> {
        self.events.for_driver(&self.driver_id).await
    }

    async fn create(&self, record: &EventRecord) -> Result<()> {
        self.events.create(record).await
    }

    async fn update_field(&self, key: &str, field: &str, value: &Value) -> Result<()> {
        self.events
            .update_field(key, &FieldPatch::new(field, value.clone()))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.events.delete(key).await
    }
}

/// The reconciled timeline of one driver.
pub struct TimelineSync<S: RecordSource<Record = EventRecord> = TimelineSource> {
    reconciler: Reconciler<S>,
    driver_id: String,
}

impl<S: RecordSource<Record = EventRecord>> Clone for TimelineSync<S> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            driver_id: self.driver_id.clone(),
        }
    }
}

impl TimelineSync<TimelineSource> {
    pub fn connect(events: EventsClient, driver_id: &str) -> Self {
        Self::with_source(TimelineSource::new(events, driver_id), driver_id)
    }
}

impl<S: RecordSource<Record = EventRecord>> TimelineSync<S> {
    pub fn with_source(source: S, driver_id: impl Into<String>) -> Self {
        Self {
            reconciler: Reconciler::new(source, DerivedFields::new(), "timeline"),
            driver_id: driver_id.into(),
        }
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub async fn load(&self) -> SyncState {
        self.reconciler.load().await
    }

    pub async fn poll(&self) -> PollOutcome {
        self.reconciler.poll().await
    }

    pub fn spawn_polling(&self, period: Duration) -> PollHandle {
        Poller::new("timeline", period).spawn(self.reconciler.clone())
    }

    /// Events in timeline order. Event numbers shown to the user are the
    /// 1-based positions in this list.
    pub fn events(&self) -> Vec<EventRecord> {
        self.reconciler.snapshot()
    }

    pub fn state(&self) -> SyncState {
        self.reconciler.state()
    }

    /// Record a new event for this driver and append it.
    pub async fn add(&self, draft: EventDraft) -> Result<EventRecord> {
        let record = draft.into_record(&self.driver_id, Local::now());
        self.reconciler.create(record.clone()).await?;
        Ok(record)
    }

    pub async fn delete(&self, event_id: &str) -> Result<EventRecord> {
        self.reconciler.remove(event_id).await
    }
}

/// Input for a new event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Used to build a readable event id
    pub driver_name: String,
    pub status: DriverStatus,
    pub video_link: String,
    /// Current gauges; samples are zero (oxygen at its default) without one
    pub telemetry: Option<LiveTelemetry>,
}

impl EventDraft {
    /// A mild event with no clip, stamped with `telemetry`.
    pub fn new(driver_name: impl Into<String>, telemetry: Option<LiveTelemetry>) -> Self {
        Self {
            driver_name: driver_name.into(),
            status: DriverStatus::Unstable,
            video_link: String::new(),
            telemetry,
        }
    }

    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_video_link(mut self, link: impl Into<String>) -> Self {
        self.video_link = link.into();
        self
    }

    pub fn into_record(self, driver_id: &str, now: DateTime<Local>) -> EventRecord {
        let (heart_rate, blood_oxygen_level, vehicle_speed) = match &self.telemetry {
            Some(t) => (
                t.heart_rate.value as f64,
                t.blood_oxygen.value as f64,
                t.speed.value as f64,
            ),
            None => (0.0, DEFAULT_BLOOD_OXYGEN, 0.0),
        };

        EventRecord {
            event_id: generate_id("event", &self.driver_name),
            driver_id: driver_id.to_string(),
            status: self.status,
            date: event_date(&now),
            time_stamp: event_time(&now),
            heart_rate,
            blood_oxygen_level,
            vehicle_speed,
            video_link: self.video_link.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySample;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_draft_uses_current_gauges() {
        let sample = TelemetrySample {
            heart_rate: 91.3,
            blood_oxygen_level: 96.6,
            vehicle_speed: 64.0,
        };
        let live = LiveTelemetry::from_sample(&sample, Utc::now());
        let now = Local.with_ymd_and_hms(2025, 3, 1, 14, 5, 0).unwrap();

        let event = EventDraft::new("Jane Doe", Some(live)).into_record("d1", now);
        assert!(event.event_id.starts_with("event_jane_doe_"));
        assert_eq!(event.driver_id, "d1");
        assert_eq!(event.status, DriverStatus::Unstable);
        assert_eq!(event.heart_rate, 91.0);
        assert_eq!(event.blood_oxygen_level, 97.0);
        assert_eq!(event.vehicle_speed, 64.0);
        assert_eq!(event.date, "March 1, 2025");
        assert_eq!(event.time_stamp, "2:05 PM");
        assert!(!event.has_clip());
    }

    #[test]
    fn test_draft_without_telemetry() {
        let now = Local.with_ymd_and_hms(2025, 12, 24, 0, 30, 0).unwrap();
        let event = EventDraft::new("Sam", None)
            .with_status(DriverStatus::Severe)
            .with_video_link(" gs://clips/a.mp4 ")
            .into_record("d2", now);
        assert_eq!(event.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);
        assert_eq!(event.time_stamp, "12:30 AM");
        assert_eq!(event.video_link, "gs://clips/a.mp4");
        assert!(event.has_clip());
    }
}
