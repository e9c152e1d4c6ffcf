//! Client for the drivers service
//!
//! Every driver document belongs to one user; the service checks ownership
//! on reads, updates and deletes, so each call carries the caller's user id.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;

use crate::error::Result;
use crate::types::{DriverRecord, EmergencyContact, FieldPatch};

use super::client::{decode_each, take_field, ServiceClient};

/// Client for `/drivers`
#[derive(Debug, Clone)]
pub struct DriversClient {
    client: ServiceClient,
}

impl DriversClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// `GET /drivers/user/{userId}` - the roster for one user.
    pub async fn roster(&self, user_id: &str) -> Result<Vec<DriverRecord>> {
        let url = self.client.url(&["drivers", "user", user_id]);
        let documents: Vec<serde_json::Value> = self.client.get(&url, "drivers").await?;
        let drivers = decode_roster(documents);
        tracing::debug!(user_id = %user_id, count = drivers.len(), "Fetched roster");
        Ok(drivers)
    }

    /// `POST /drivers`
    pub async fn create(&self, driver: &DriverRecord, user_id: &str) -> Result<()> {
        let url = self.client.url(&["drivers"]);
        let body = CreateDriverRequest::new(driver, user_id);
        self.client.post(&url, &body).await?;
        tracing::info!(driver_id = %driver.driver_id, "Created driver");
        Ok(())
    }

    /// `GET /drivers/{id}?userId=`
    pub async fn get(&self, driver_id: &str, user_id: &str) -> Result<serde_json::Value> {
        let url = self.client.url(&["drivers", driver_id]);
        let request = self
            .client
            .request(Method::GET, &url)
            .query(&[("userId", user_id)]);
        let envelope = self.client.send(request).await?;
        take_field(envelope, "driver")
    }

    /// `GET /drivers/{id}?userId=`, decoded as a record.
    pub async fn get_record(&self, driver_id: &str, user_id: &str) -> Result<DriverRecord> {
        let mut document = self.get(driver_id, user_id).await?;
        // Older documents omit their own id; the path is authoritative.
        if let Some(map) = document.as_object_mut() {
            map.entry("driverId")
                .or_insert_with(|| serde_json::Value::String(driver_id.to_string()));
        }
        Ok(serde_json::from_value(document)?)
    }

    /// `PUT /drivers/{id}` with a single-field patch.
    pub async fn update_field(&self, driver_id: &str, patch: &FieldPatch) -> Result<()> {
        let url = self.client.url(&["drivers", driver_id]);
        self.client.put(&url, patch).await?;
        tracing::debug!(
            driver_id = %driver_id,
            field = %patch.field_to_change,
            "Updated driver field"
        );
        Ok(())
    }

    /// `DELETE /drivers/{id}`; the service also removes the driver's events.
    pub async fn delete(&self, driver_id: &str, user_id: &str) -> Result<()> {
        let url = self.client.url(&["drivers", driver_id]);
        let body = OwnerRequest { user_id };
        self.client.delete(&url, Some(&body)).await?;
        tracing::info!(driver_id = %driver_id, "Deleted driver");
        Ok(())
    }

    /// `POST /drivers/{id}/emergency-contacts`
    pub async fn add_emergency_contact(
        &self,
        driver_id: &str,
        user_id: &str,
        contact: &EmergencyContact,
    ) -> Result<()> {
        let url = self.client.url(&["drivers", driver_id, "emergency-contacts"]);
        let body = EmergencyContactRequest {
            user_id,
            name: &contact.name,
            phone_number: &contact.phone_number,
        };
        self.client.post(&url, &body).await?;
        Ok(())
    }
}

fn decode_roster(documents: Vec<serde_json::Value>) -> Vec<DriverRecord> {
    decode_each(documents, "driverId")
}

/// Request body for POST /drivers
///
/// Creation uses camelCase names even though the stored document does not.
#[derive(Serialize)]
struct CreateDriverRequest<'a> {
    #[serde(rename = "driverId")]
    driver_id: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
    name: &'a str,
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "profilePic")]
    profile_pic: &'a str,
    #[serde(rename = "productId", skip_serializing_if = "Option::is_none")]
    product_id: Option<&'a serde_json::Value>,
    #[serde(rename = "emergencyContacts")]
    emergency_contacts: &'a [EmergencyContact],
    events: [serde_json::Value; 0],
    status: &'a str,
    driving: bool,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl<'a> CreateDriverRequest<'a> {
    fn new(driver: &'a DriverRecord, user_id: &'a str) -> Self {
        Self {
            driver_id: &driver.driver_id,
            user_id,
            name: &driver.name,
            phone_number: driver.phone_number.as_deref().unwrap_or(""),
            profile_pic: driver.profile_pic.as_deref().unwrap_or(""),
            product_id: driver.product_id.as_ref(),
            emergency_contacts: &driver.emergency_contacts,
            events: [],
            status: driver.status.as_str(),
            driving: driver.driving,
            created_at: driver.created_at,
        }
    }
}

/// Request body for DELETE /drivers/{id}
#[derive(Serialize)]
struct OwnerRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

/// Request body for POST /drivers/{id}/emergency-contacts
#[derive(Serialize)]
struct EmergencyContactRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    name: &'a str,
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DriverStatus;
    use serde_json::json;

    #[test]
    fn test_create_request_carries_owner() {
        let mut driver = DriverRecord::new("d1", "Jane Doe");
        driver.phone_number = Some("555-0100".to_string());
        driver.created_at = None;

        let body = CreateDriverRequest::new(&driver, "u1");
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["driverId"], json!("d1"));
        assert_eq!(value["userId"], json!("u1"));
        assert_eq!(value["phoneNumber"], json!("555-0100"));
        assert_eq!(value["profilePic"], json!(""));
        assert_eq!(value["status"], json!("Idle"));
        assert_eq!(value["events"], json!([]));
    }

    #[test]
    fn test_roster_keeps_good_drivers_when_one_is_malformed() {
        let drivers = decode_roster(vec![
            json!({"driverId": "a", "name": "Ann", "status": "LockedIn"}),
            json!({"driverId": "b", "name": null}),
            json!({"driverId": "c", "name": "Cy", "status": "Asleep"}),
            json!({"name": "no id"}),
        ]);

        let ids: Vec<_> = drivers.iter().map(|d| d.driver_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(drivers[0].status, DriverStatus::LockedIn);
        assert_eq!(drivers[1].name, "");
    }

    #[test]
    fn test_emergency_contact_request_shape() {
        let body = EmergencyContactRequest {
            user_id: "u1",
            name: "Sam",
            phone_number: "555",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"userId": "u1", "name": "Sam", "phoneNumber": "555"})
        );
    }
}
