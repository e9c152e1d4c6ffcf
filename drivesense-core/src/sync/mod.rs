//! Polling reconciler with an optimistic local overlay
//!
//! A [`Reconciler`] holds a keyed collection that converges on a remote
//! authoritative collection. It is refreshed on a fixed interval by a
//! [`Poller`] and absorbs local mutations as soon as the
//! matching remote call has succeeded.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --load ok--> Synced --tick--> Fetching --ok--> Synced
//!       |                                        |
//!       +--load err--> Empty                     +--err--> Synced (stale data kept)
//! ```
//!
//! - The first load replaces the collection wholesale; a failed first load
//!   presents an empty collection rather than an error.
//! - Every successful poll replaces the collection wholesale with the fresh
//!   snapshot. Consumers keep UI-local state keyed by record id, never by
//!   position.
//! - Failed background polls are logged and otherwise ignored.
//! - Mutations (`create`, `update`, `remove`) call the remote service first
//!   and only touch local state once it succeeds. Nothing is retried.
//!
//! ## Known ordering gap
//!
//! Overlapping poll ticks are not serialized. If a slow response lands after
//! a later tick's response, the slow one is applied last and wins until the
//! next poll.

pub mod derive;
pub mod poller;
mod reconciler;

pub use derive::{merge_fields, DerivedField, DerivedFields};
pub use poller::{PollHandle, PollLease, Pollable, Poller};
pub use reconciler::{PollOutcome, Reconciler};

use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::types::{DriverRecord, EventRecord};

/// A record that can live in a reconciled collection.
pub trait SyncRecord:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Stable unique key, assigned at creation and never changed.
    fn key(&self) -> &str;
}

impl SyncRecord for DriverRecord {
    fn key(&self) -> &str {
        &self.driver_id
    }
}

impl SyncRecord for EventRecord {
    fn key(&self) -> &str {
        &self.event_id
    }
}

/// The remote side of a reconciled collection.
///
/// Implementations wrap one service and whatever scope it needs (a user id
/// for the roster, a driver id for a timeline).
pub trait RecordSource: Send + Sync + 'static {
    type Record: SyncRecord;

    /// Fetch the full authoritative collection.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Self::Record>>> + Send;

    /// Persist a new record.
    fn create(&self, record: &Self::Record) -> impl Future<Output = Result<()>> + Send;

    /// Persist one field of an existing record (single-field patch).
    fn update_field(
        &self,
        key: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a record.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Where a collection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No fetch has completed yet
    Uninitialized,
    /// Synced, with a background poll in flight
    Fetching,
    /// Last settled fetch succeeded
    Synced,
    /// The first load failed; shown as an empty collection
    Empty,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Uninitialized => "uninitialized",
            SyncState::Fetching => "fetching",
            SyncState::Synced => "synced",
            SyncState::Empty => "empty",
        }
    }
}
