//! Core domain types for drivesense
//!
//! These types mirror the documents served by the drivers, events and users
//! services. Field names on the wire follow the services, which mix
//! camelCase (`driverId`, `profilePic`) with snake_case (`phone_number`,
//! `emergency_contacts`); the serde attributes below pin each one.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | The fleet manager signed in to the dashboard |
//! | **Driver** | A monitored person on the user's roster |
//! | **Event** | A recorded safety incident for one driver |
//! | **Status** | Severity tag: idle < locked in < unstable < severe |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::Error;

/// Asset shown when a driver has no profile picture.
pub const DEFAULT_PROFILE_PIC: &str = "/images/profile.png";

/// Blood oxygen reading assumed when a document has none. The services
/// store `0` until a sensor reports, so zero counts as missing too.
pub const DEFAULT_BLOOD_OXYGEN: f64 = 98.0;

// ============================================
// Driver status
// ============================================

/// Severity tag for a driver or event.
///
/// Variants are declared in ordinal order, so the derived `Ord` sorts
/// idle drivers first and severe ones last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DriverStatus {
    #[default]
    Idle,
    LockedIn,
    Unstable,
    Severe,
}

impl DriverStatus {
    /// Wire name accepted by the drivers service
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Idle => "Idle",
            DriverStatus::LockedIn => "LockedIn",
            DriverStatus::Unstable => "Unstable",
            DriverStatus::Severe => "Severe",
        }
    }

    /// Whether a driver with this status counts as driving.
    pub fn is_driving(&self) -> bool {
        *self != DriverStatus::Idle
    }

    /// Card color for the roster.
    pub fn color(&self) -> CardColor {
        match self {
            DriverStatus::Idle => CardColor::Gray,
            DriverStatus::LockedIn => CardColor::Green,
            DriverStatus::Unstable => CardColor::Yellow,
            DriverStatus::Severe => CardColor::Red,
        }
    }

    pub fn all() -> [DriverStatus; 4] {
        [
            DriverStatus::Idle,
            DriverStatus::LockedIn,
            DriverStatus::Unstable,
            DriverStatus::Severe,
        ]
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = Error;

    /// Accepts the current names plus the ones earlier revisions used.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" | "inactive" => Ok(DriverStatus::Idle),
            "lockedin" | "locked_in" | "stable" | "active" => Ok(DriverStatus::LockedIn),
            "unstable" | "mild" => Ok(DriverStatus::Unstable),
            "severe" | "critical" => Ok(DriverStatus::Severe),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

impl Serialize for DriverStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DriverStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => raw.parse().map_err(serde::de::Error::custom),
            None => Ok(DriverStatus::default()),
        }
    }
}

/// Roster card color, one per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardColor {
    Gray,
    Green,
    Yellow,
    Red,
}

impl CardColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardColor::Gray => "gray",
            CardColor::Green => "green",
            CardColor::Yellow => "yellow",
            CardColor::Red => "red",
        }
    }
}

// ============================================
// Drivers
// ============================================

/// Someone to call when a driver's readings turn severe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "phone_number", alias = "phoneNumber", default)]
    pub phone_number: String,
}

/// A driver on the signed-in user's roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    /// Reconciliation key, immutable after creation
    #[serde(rename = "driverId")]
    pub driver_id: String,

    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,

    #[serde(default)]
    pub status: DriverStatus,

    /// Derived from `status`; older documents store "Yes"/"No"
    #[serde(default, deserialize_with = "deserialize_driving")]
    pub driving: bool,

    /// URL or inline-encoded image
    #[serde(
        rename = "profilePic",
        default,
        deserialize_with = "deserialize_non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_pic: Option<String>,

    #[serde(
        rename = "phone_number",
        alias = "phoneNumber",
        default,
        deserialize_with = "deserialize_non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<String>,

    /// Opaque product identifier (number or string depending on revision)
    #[serde(rename = "productId", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<serde_json::Value>,

    #[serde(rename = "emergency_contacts", alias = "emergencyContacts", default)]
    pub emergency_contacts: Vec<EmergencyContact>,

    /// Creation instant; used only for newest/oldest ordering
    #[serde(
        rename = "createdAt",
        alias = "timeStamp",
        default,
        deserialize_with = "deserialize_lenient_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl DriverRecord {
    /// A freshly created idle driver.
    pub fn new(driver_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            name: name.into(),
            status: DriverStatus::Idle,
            driving: false,
            profile_pic: None,
            phone_number: None,
            product_id: None,
            emergency_contacts: Vec::new(),
            created_at: Some(Utc::now()),
            user_id: None,
        }
    }

    pub fn profile_pic_or_default(&self) -> &str {
        self.profile_pic.as_deref().unwrap_or(DEFAULT_PROFILE_PIC)
    }
}

fn deserialize_driving<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Driving {
        Flag(bool),
        Text(String),
    }

    match Option::<Driving>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Driving::Flag(flag)) => Ok(flag),
        Some(Driving::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid driving flag: {}",
                other
            ))),
        },
    }
}

fn deserialize_nullable_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_non_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// RFC 3339 timestamps parse; anything else (including the empty string the
/// drivers service writes by default) reads as absent.
fn deserialize_lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    })
}

// ============================================
// Events
// ============================================

/// A safety event recorded for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Reconciliation key
    #[serde(rename = "eventId")]
    pub event_id: String,

    /// Owning driver; trusted from the server
    #[serde(rename = "driverId", default)]
    pub driver_id: String,

    #[serde(default)]
    pub status: DriverStatus,

    /// Display date, formatted by the producer
    #[serde(default)]
    pub date: String,

    /// Display time, formatted by the producer
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: String,

    #[serde(rename = "heartRate", default)]
    pub heart_rate: f64,

    #[serde(
        rename = "bloodOxygenLevel",
        alias = "breathingRate",
        default = "default_blood_oxygen",
        deserialize_with = "deserialize_blood_oxygen"
    )]
    pub blood_oxygen_level: f64,

    #[serde(rename = "vehicleSpeed", default)]
    pub vehicle_speed: f64,

    /// Evidence pointer (video or image URI), empty when none
    #[serde(rename = "videoLink", default)]
    pub video_link: String,
}

pub(crate) fn default_blood_oxygen() -> f64 {
    DEFAULT_BLOOD_OXYGEN
}

/// Null and `0` both mean no reading yet.
pub(crate) fn deserialize_blood_oxygen<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<f64, D::Error> {
    Ok(match Option::<f64>::deserialize(deserializer)? {
        Some(level) if level > 0.0 => level,
        _ => DEFAULT_BLOOD_OXYGEN,
    })
}

impl EventRecord {
    pub fn has_clip(&self) -> bool {
        !self.video_link.trim().is_empty()
    }
}

// ============================================
// Patches
// ============================================

/// Single-field update body accepted by every service's PUT endpoint.
///
/// Full-object updates are not part of the contract; multi-field edits are
/// sent as a sequence of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(rename = "fieldToChange")]
    pub field_to_change: String,

    #[serde(rename = "newValue")]
    pub new_value: serde_json::Value,

    /// Owner check for driver updates
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl FieldPatch {
    pub fn new(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field_to_change: field.into(),
            new_value: value.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

// ============================================
// Users
// ============================================

/// An account on the users service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "phoneNumber", alias = "phone_number", default)]
    pub phone_number: String,
}

/// Account creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ============================================
// Identifiers
// ============================================

/// Generate an identifier like `driver_jane_doe_1f0c...`.
pub fn generate_id(prefix: &str, display_name: &str) -> String {
    let slug: String = display_name
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    if slug.is_empty() {
        format!("{}_{}", prefix, suffix)
    } else {
        format!("{}_{}_{}", prefix, slug, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_ordering() {
        assert!(DriverStatus::Idle < DriverStatus::LockedIn);
        assert!(DriverStatus::LockedIn < DriverStatus::Unstable);
        assert!(DriverStatus::Unstable < DriverStatus::Severe);
    }

    #[test]
    fn test_status_aliases() {
        assert_eq!("Stable".parse::<DriverStatus>().unwrap(), DriverStatus::LockedIn);
        assert_eq!("Mild".parse::<DriverStatus>().unwrap(), DriverStatus::Unstable);
        assert_eq!("Critical".parse::<DriverStatus>().unwrap(), DriverStatus::Severe);
        assert_eq!("Inactive".parse::<DriverStatus>().unwrap(), DriverStatus::Idle);
        assert!("Asleep".parse::<DriverStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_to_server_names() {
        assert_eq!(
            serde_json::to_value(DriverStatus::LockedIn).unwrap(),
            json!("LockedIn")
        );
        let parsed: DriverStatus = serde_json::from_value(json!("Mild")).unwrap();
        assert_eq!(parsed, DriverStatus::Unstable);
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(DriverStatus::Idle.color(), CardColor::Gray);
        assert_eq!(DriverStatus::Severe.color().as_str(), "red");
    }

    #[test]
    fn test_driver_from_service_document() {
        let doc = json!({
            "driverId": "d1",
            "name": "Jane Doe",
            "phone_number": "555-0100",
            "emergency_contacts": [{"name": "Sam Doe", "phone_number": "555-0101"}],
            "events": [],
            "timeStamp": "",
            "heartRate": 0,
            "profilePic": "",
            "productId": 0,
            "status": "LockedIn",
            "driving": true,
            "userId": "u1"
        });

        let driver: DriverRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(driver.driver_id, "d1");
        assert_eq!(driver.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(driver.emergency_contacts.len(), 1);
        assert_eq!(driver.status, DriverStatus::LockedIn);
        assert!(driver.driving);
        assert!(driver.profile_pic.is_none());
        assert_eq!(driver.profile_pic_or_default(), DEFAULT_PROFILE_PIC);
        assert!(driver.created_at.is_none());
        assert_eq!(driver.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_driver_legacy_driving_flag() {
        let driver: DriverRecord =
            serde_json::from_value(json!({"driverId": "d2", "driving": "Yes"})).unwrap();
        assert!(driver.driving);
        assert_eq!(driver.status, DriverStatus::Idle);

        let driver: DriverRecord =
            serde_json::from_value(json!({"driverId": "d3", "driving": "No"})).unwrap();
        assert!(!driver.driving);
    }

    #[test]
    fn test_driver_camel_case_aliases() {
        let driver: DriverRecord = serde_json::from_value(json!({
            "driverId": "d4",
            "phoneNumber": "555-0199",
            "emergencyContacts": [{"name": "A", "phoneNumber": "1"}],
            "createdAt": "2025-03-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(driver.phone_number.as_deref(), Some("555-0199"));
        assert_eq!(driver.emergency_contacts[0].phone_number, "1");
        assert!(driver.created_at.is_some());
    }

    #[test]
    fn test_event_defaults_blood_oxygen() {
        let event: EventRecord = serde_json::from_value(json!({
            "eventId": "e1",
            "driverId": "d1",
            "status": "Mild",
            "heartRate": 101,
            "vehicleSpeed": 72.5,
            "videoLink": ""
        }))
        .unwrap();
        assert_eq!(event.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);
        assert_eq!(event.status, DriverStatus::Unstable);
        assert!(!event.has_clip());
    }

    #[test]
    fn test_event_zero_blood_oxygen_means_no_reading() {
        let event: EventRecord =
            serde_json::from_value(json!({"eventId": "e1", "bloodOxygenLevel": 0})).unwrap();
        assert_eq!(event.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);

        let event: EventRecord =
            serde_json::from_value(json!({"eventId": "e1", "bloodOxygenLevel": null})).unwrap();
        assert_eq!(event.blood_oxygen_level, DEFAULT_BLOOD_OXYGEN);

        let event: EventRecord =
            serde_json::from_value(json!({"eventId": "e1", "bloodOxygenLevel": 93.5})).unwrap();
        assert_eq!(event.blood_oxygen_level, 93.5);
    }

    #[test]
    fn test_driver_tolerates_null_name_and_status() {
        let driver: DriverRecord = serde_json::from_value(json!({
            "driverId": "d5",
            "name": null,
            "status": null
        }))
        .unwrap();
        assert_eq!(driver.name, "");
        assert_eq!(driver.status, DriverStatus::Idle);
    }

    #[test]
    fn test_event_legacy_breathing_rate() {
        let event: EventRecord =
            serde_json::from_value(json!({"eventId": "e2", "breathingRate": 91})).unwrap();
        assert_eq!(event.blood_oxygen_level, 91.0);
    }

    #[test]
    fn test_field_patch_wire_shape() {
        let patch = FieldPatch::new("driving", true).with_user("u1");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"fieldToChange": "driving", "newValue": true, "userId": "u1"})
        );

        let bare = FieldPatch::new("name", "Jane Roe");
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({"fieldToChange": "name", "newValue": "Jane Roe"})
        );
    }

    #[test]
    fn test_generate_id() {
        let id = generate_id("driver", "Jane  Doe");
        assert!(id.starts_with("driver_jane_doe_"));
        assert_ne!(id, generate_id("driver", "Jane  Doe"));
        assert!(generate_id("event", "").starts_with("event_"));
    }
}
