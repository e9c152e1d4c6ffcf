//! Live telemetry gauges
//!
//! A read-only poll of one driver's latest samples. Each successful tick
//! replaces all three gauges at once; a failed tick leaves the previous
//! reading on display. There is no collection and nothing is written back.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::DriversClient;
use crate::error::Result;
use crate::session::Session;
use crate::sync::{PollHandle, PollLease, Pollable, Poller};

/// The three monitored metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    HeartRate,
    BloodOxygen,
    VehicleSpeed,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::HeartRate => "Heart rate",
            Metric::BloodOxygen => "Blood oxygen",
            Metric::VehicleSpeed => "Speed",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::HeartRate => "bpm",
            Metric::BloodOxygen => "%",
            Metric::VehicleSpeed => "km/h",
        }
    }

    /// Three-tier classification against fixed thresholds.
    pub fn classify(&self, value: f64) -> GaugeLevel {
        match self {
            Metric::HeartRate if value < 80.0 => GaugeLevel::Good,
            Metric::HeartRate if value < 100.0 => GaugeLevel::Mild,
            Metric::BloodOxygen if value >= 95.0 => GaugeLevel::Good,
            Metric::BloodOxygen if value >= 90.0 => GaugeLevel::Mild,
            Metric::VehicleSpeed if value < 60.0 => GaugeLevel::Good,
            Metric::VehicleSpeed if value < 80.0 => GaugeLevel::Mild,
            _ => GaugeLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GaugeLevel {
    Good,
    Mild,
    High,
}

impl GaugeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GaugeLevel::Good => "good",
            GaugeLevel::Mild => "mild",
            GaugeLevel::High => "high",
        }
    }
}

/// One displayed reading, rounded to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gauge {
    pub metric: Metric,
    pub value: i64,
    pub level: GaugeLevel,
}

impl Gauge {
    pub fn new(metric: Metric, raw: f64) -> Self {
        let rounded = raw.round();
        Self {
            metric,
            value: rounded as i64,
            level: metric.classify(rounded),
        }
    }
}

/// Raw samples as read from the driver document.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetrySample {
    #[serde(rename = "heartRate", default)]
    pub heart_rate: f64,
    #[serde(
        rename = "bloodOxygenLevel",
        alias = "breathingRate",
        default = "crate::types::default_blood_oxygen",
        deserialize_with = "crate::types::deserialize_blood_oxygen"
    )]
    pub blood_oxygen_level: f64,
    #[serde(rename = "vehicleSpeed", default)]
    pub vehicle_speed: f64,
}

/// The three gauges as of one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTelemetry {
    pub heart_rate: Gauge,
    pub blood_oxygen: Gauge,
    pub speed: Gauge,
    pub sampled_at: DateTime<Utc>,
}

impl LiveTelemetry {
    pub fn from_sample(sample: &TelemetrySample, sampled_at: DateTime<Utc>) -> Self {
        Self {
            heart_rate: Gauge::new(Metric::HeartRate, sample.heart_rate),
            blood_oxygen: Gauge::new(Metric::BloodOxygen, sample.blood_oxygen_level),
            speed: Gauge::new(Metric::VehicleSpeed, sample.vehicle_speed),
            sampled_at,
        }
    }

    pub fn gauges(&self) -> [Gauge; 3] {
        [self.heart_rate, self.blood_oxygen, self.speed]
    }

    /// Worst level across the three gauges.
    pub fn worst(&self) -> GaugeLevel {
        self.gauges()
            .iter()
            .map(|g| g.level)
            .max()
            .unwrap_or(GaugeLevel::Good)
    }
}

/// Where the latest samples come from.
pub trait TelemetrySource: Send + Sync + 'static {
    fn latest(&self) -> impl Future<Output = Result<TelemetrySample>> + Send;
}

/// Reads samples from the driver document on the drivers service.
#[derive(Debug, Clone)]
pub struct DriverTelemetry {
    drivers: DriversClient,
    driver_id: String,
    session: Session,
}

impl DriverTelemetry {
    pub fn new(drivers: DriversClient, driver_id: impl Into<String>, session: &Session) -> Self {
        Self {
            drivers,
            driver_id: driver_id.into(),
            session: session.clone(),
        }
    }
}

impl TelemetrySource for DriverTelemetry {
    async fn latest(&self) -> Result<TelemetrySample> {
        let document = self
            .drivers
            .get(&self.driver_id, &self.session.user_id)
            .await?;
        Ok(serde_json::from_value(document)?)
    }
}

/// Polls a [`TelemetrySource`] and holds the latest reading.
pub struct TelemetryMonitor<T: TelemetrySource> {
    source: Arc<T>,
    current: Arc<RwLock<Option<LiveTelemetry>>>,
}

impl<T: TelemetrySource> Clone for TelemetryMonitor<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: TelemetrySource> TelemetryMonitor<T> {
    pub fn new(source: T) -> Self {
        Self {
            source: Arc::new(source),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Latest reading; `None` until the first successful tick.
    pub fn current(&self) -> Option<LiveTelemetry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch once. Returns whether the gauges were replaced.
    pub async fn refresh(&self) -> bool {
        self.refresh_with(&PollLease::detached()).await
    }

    async fn refresh_with(&self, lease: &PollLease) -> bool {
        match self.source.latest().await {
            Ok(sample) if lease.is_active() => {
                let reading = LiveTelemetry::from_sample(&sample, Utc::now());
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(reading);
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(error = %e, "Telemetry read failed, keeping previous reading");
                false
            }
        }
    }

    pub fn spawn_polling(&self, period: Duration) -> PollHandle {
        Poller::new("telemetry", period).spawn(self.clone())
    }
}

impl<T: TelemetrySource> Pollable for TelemetryMonitor<T> {
    async fn initial(&self, lease: &PollLease) {
        self.refresh_with(lease).await;
    }

    async fn tick(&self, lease: &PollLease) {
        self.refresh_with(lease).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::DEFAULT_BLOOD_OXYGEN;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<Result<TelemetrySample>>>);

    impl TelemetrySource for Scripted {
        async fn latest(&self) -> Result<TelemetrySample> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Http("exhausted".to_string())))
        }
    }

    fn sample(hr: f64, o2: f64, speed: f64) -> TelemetrySample {
        TelemetrySample {
            heart_rate: hr,
            blood_oxygen_level: o2,
            vehicle_speed: speed,
        }
    }

    #[test]
    fn test_heart_rate_thresholds() {
        assert_eq!(Metric::HeartRate.classify(79.0), GaugeLevel::Good);
        assert_eq!(Metric::HeartRate.classify(80.0), GaugeLevel::Mild);
        assert_eq!(Metric::HeartRate.classify(99.0), GaugeLevel::Mild);
        assert_eq!(Metric::HeartRate.classify(100.0), GaugeLevel::High);
    }

    #[test]
    fn test_blood_oxygen_thresholds() {
        assert_eq!(Metric::BloodOxygen.classify(98.0), GaugeLevel::Good);
        assert_eq!(Metric::BloodOxygen.classify(95.0), GaugeLevel::Good);
        assert_eq!(Metric::BloodOxygen.classify(92.0), GaugeLevel::Mild);
        assert_eq!(Metric::BloodOxygen.classify(89.0), GaugeLevel::High);
    }

    #[test]
    fn test_speed_thresholds() {
        assert_eq!(Metric::VehicleSpeed.classify(30.0), GaugeLevel::Good);
        assert_eq!(Metric::VehicleSpeed.classify(60.0), GaugeLevel::Mild);
        assert_eq!(Metric::VehicleSpeed.classify(80.0), GaugeLevel::High);
    }

    #[test]
    fn test_gauge_rounds_before_classifying() {
        let gauge = Gauge::new(Metric::HeartRate, 79.6);
        assert_eq!(gauge.value, 80);
        assert_eq!(gauge.level, GaugeLevel::Mild);
    }

    #[test]
    fn test_sample_from_driver_document() {
        let parsed: TelemetrySample = serde_json::from_value(json!({
            "driverId": "d1",
            "heartRate": 88.4,
            "vehicleSpeed": 41
        }))
        .unwrap();
        assert_eq!(parsed.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);

        let reading = LiveTelemetry::from_sample(&parsed, Utc::now());
        assert_eq!(reading.heart_rate.value, 88);
        assert_eq!(reading.worst(), GaugeLevel::Mild);
    }

    #[test]
    fn test_new_driver_zero_oxygen_reads_as_default() {
        let parsed: TelemetrySample = serde_json::from_value(json!({
            "driverId": "d1",
            "heartRate": 0,
            "bloodOxygenLevel": 0,
            "vehicleSpeed": 0
        }))
        .unwrap();
        assert_eq!(parsed.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);

        let reading = LiveTelemetry::from_sample(&parsed, Utc::now());
        assert_eq!(reading.blood_oxygen.value, 98);
        assert_eq!(reading.blood_oxygen.level, GaugeLevel::Good);
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_reading() {
        let monitor = TelemetryMonitor::new(Scripted(Mutex::new(
            vec![
                Ok(sample(72.0, 98.0, 30.0)),
                Err(Error::Http("timeout".to_string())),
                Ok(sample(104.0, 89.0, 85.0)),
            ]
            .into(),
        )));
        assert!(monitor.current().is_none());

        assert!(monitor.refresh().await);
        let first = monitor.current().unwrap();
        assert_eq!(first.worst(), GaugeLevel::Good);

        assert!(!monitor.refresh().await);
        assert_eq!(monitor.current().unwrap(), first);

        assert!(monitor.refresh().await);
        let third = monitor.current().unwrap();
        assert_eq!(third.gauges().map(|g| g.level), [GaugeLevel::High; 3]);
    }
}
