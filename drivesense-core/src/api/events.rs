//! Client for the events service

use crate::error::Result;
use crate::types::{EventRecord, FieldPatch};

use super::client::{decode_each, ServiceClient};

/// Client for `/events` and `/drivers/{id}/events`
#[derive(Debug, Clone)]
pub struct EventsClient {
    client: ServiceClient,
}

impl EventsClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// `GET /drivers/{driverId}/events` - one driver's timeline.
    pub async fn for_driver(&self, driver_id: &str) -> Result<Vec<EventRecord>> {
        let url = self.client.url(&["drivers", driver_id, "events"]);
        let documents: Vec<serde_json::Value> = self.client.get(&url, "events").await?;
        let events: Vec<EventRecord> = decode_each(documents, "eventId");
        tracing::debug!(driver_id = %driver_id, count = events.len(), "Fetched events");
        Ok(events)
    }

    /// `POST /events`
    pub async fn create(&self, event: &EventRecord) -> Result<()> {
        let url = self.client.url(&["events"]);
        self.client.post(&url, event).await?;
        tracing::info!(
            event_id = %event.event_id,
            driver_id = %event.driver_id,
            "Created event"
        );
        Ok(())
    }

    /// `GET /events/{eventId}`
    pub async fn get(&self, event_id: &str) -> Result<EventRecord> {
        let url = self.client.url(&["events", event_id]);
        self.client.get(&url, "event").await
    }

    /// `PUT /events/{eventId}` with a single-field patch.
    pub async fn update_field(&self, event_id: &str, patch: &FieldPatch) -> Result<()> {
        let url = self.client.url(&["events", event_id]);
        self.client.put(&url, patch).await?;
        Ok(())
    }

    /// `DELETE /events/{eventId}`
    pub async fn delete(&self, event_id: &str) -> Result<()> {
        let url = self.client.url(&["events", event_id]);
        self.client.delete::<()>(&url, None).await?;
        tracing::info!(event_id = %event_id, "Deleted event");
        Ok(())
    }
}
