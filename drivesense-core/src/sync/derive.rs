//! Derived-field registry and record patching
//!
//! Some fields are pure functions of other fields (a driver is `driving`
//! whenever its status is not idle). Each such invariant is registered once
//! as a [`DerivedField`]; the reconciler evaluates every registered field on
//! every polled record and corrects the ones that drifted.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::SyncRecord;

/// One derived invariant: `field` must always equal `derive(record)`.
pub struct DerivedField<R> {
    /// Wire name of the derived field
    pub field: &'static str,
    derive: fn(&R) -> Value,
}

impl<R> DerivedField<R> {
    pub fn new(field: &'static str, derive: fn(&R) -> Value) -> Self {
        Self { field, derive }
    }

    pub fn expected(&self, record: &R) -> Value {
        (self.derive)(record)
    }
}

impl<R> Clone for DerivedField<R> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            derive: self.derive,
        }
    }
}

impl<R> std::fmt::Debug for DerivedField<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedField")
            .field("field", &self.field)
            .finish()
    }
}

/// Registry of derived fields for one record type.
pub struct DerivedFields<R> {
    fields: Vec<DerivedField<R>>,
}

impl<R> Default for DerivedFields<R> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<R> Clone for DerivedFields<R> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<R> std::fmt::Debug for DerivedFields<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

impl<R: SyncRecord> DerivedFields<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` as derived by `derive`.
    pub fn with(mut self, field: &'static str, derive: fn(&R) -> Value) -> Self {
        self.fields.push(DerivedField::new(field, derive));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedField<R>> {
        self.fields.iter()
    }

    /// Fields whose stored value disagrees with their derivation, paired
    /// with the corrected value. Empty when the record is consistent.
    pub fn drift(&self, record: &R) -> Result<Vec<(&'static str, Value)>> {
        if self.fields.is_empty() {
            return Ok(Vec::new());
        }
        let stored = serde_json::to_value(record)?;
        Ok(self
            .fields
            .iter()
            .filter_map(|f| {
                let expected = f.expected(record);
                (stored.get(f.field) != Some(&expected)).then_some((f.field, expected))
            })
            .collect())
    }
}

/// Merge `fields` into a copy of `record`, keyed by wire name.
///
/// Fails if the result no longer deserializes or if the patch would change
/// the record's key.
pub fn merge_fields<R: SyncRecord>(record: &R, fields: &Map<String, Value>) -> Result<R> {
    let mut value = serde_json::to_value(record)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| Error::InvalidPatch("record is not a JSON object".to_string()))?;

    for (field, new_value) in fields {
        object.insert(field.clone(), new_value.clone());
    }

    let merged: R = serde_json::from_value(value)
        .map_err(|e| Error::InvalidPatch(format!("patch does not fit record: {}", e)))?;

    if merged.key() != record.key() {
        return Err(Error::InvalidPatch(format!(
            "patch would change key {} to {}",
            record.key(),
            merged.key()
        )));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriverRecord, DriverStatus};
    use serde_json::json;

    fn driving_fields() -> DerivedFields<DriverRecord> {
        DerivedFields::new().with("driving", |d: &DriverRecord| {
            Value::Bool(d.status.is_driving())
        })
    }

    #[test]
    fn test_drift_detected() {
        let mut driver = DriverRecord::new("d1", "Jane Doe");
        driver.status = DriverStatus::LockedIn;
        driver.driving = false;

        let drift = driving_fields().drift(&driver).unwrap();
        assert_eq!(drift, vec![("driving", json!(true))]);
    }

    #[test]
    fn test_no_drift_when_consistent() {
        let mut driver = DriverRecord::new("d1", "Jane Doe");
        driver.status = DriverStatus::Severe;
        driver.driving = true;
        assert!(driving_fields().drift(&driver).unwrap().is_empty());

        let idle = DriverRecord::new("d2", "Sam Roe");
        assert!(driving_fields().drift(&idle).unwrap().is_empty());
    }

    #[test]
    fn test_empty_registry_never_drifts() {
        let registry: DerivedFields<DriverRecord> = DerivedFields::new();
        assert!(registry.is_empty());
        let driver = DriverRecord::new("d1", "Jane Doe");
        assert!(registry.drift(&driver).unwrap().is_empty());
    }

    #[test]
    fn test_merge_fields_by_wire_name() {
        let driver = DriverRecord::new("d1", "Jane Doe");
        let mut patch = Map::new();
        patch.insert("name".to_string(), json!("Jane Roe"));
        patch.insert("phone_number".to_string(), json!("555-0100"));
        patch.insert(
            "emergency_contacts".to_string(),
            json!([{"name": "Sam", "phone_number": "555-0101"}]),
        );

        let merged = merge_fields(&driver, &patch).unwrap();
        assert_eq!(merged.name, "Jane Roe");
        assert_eq!(merged.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(merged.emergency_contacts.len(), 1);
        assert_eq!(merged.created_at, driver.created_at);
    }

    #[test]
    fn test_merge_rejects_key_change() {
        let driver = DriverRecord::new("d1", "Jane Doe");
        let mut patch = Map::new();
        patch.insert("driverId".to_string(), json!("d2"));
        assert!(matches!(
            merge_fields(&driver, &patch),
            Err(Error::InvalidPatch(_))
        ));
    }

    #[test]
    fn test_merge_rejects_bad_value() {
        let driver = DriverRecord::new("d1", "Jane Doe");
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!("Asleep"));
        assert!(merge_fields(&driver, &patch).is_err());
    }
}
