//! The reconciled collection itself

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::derive::{merge_fields, DerivedFields};
use super::poller::{PollLease, Pollable};
use super::{RecordSource, SyncRecord, SyncState};

/// What a single poll did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetched snapshot replaced the collection
    Applied {
        records: usize,
        /// Corrective updates issued for drifted derived fields
        corrections: usize,
    },
    /// The fetch failed; the previous collection was kept
    Failed,
    /// The poller was stopped while the fetch was in flight
    Discarded,
}

#[derive(Debug)]
struct Inner<R> {
    records: Vec<R>,
    settled: SyncState,
    loading: bool,
    in_flight: usize,
}

/// A keyed collection kept in step with a [`RecordSource`].
///
/// Cheap to clone; clones share the same collection. Reads never block on
/// the network, and no lock is held across an await point.
pub struct Reconciler<S: RecordSource> {
    source: Arc<S>,
    derived: Arc<DerivedFields<S::Record>>,
    inner: Arc<RwLock<Inner<S::Record>>>,
    label: &'static str,
}

impl<S: RecordSource> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            derived: Arc::clone(&self.derived),
            inner: Arc::clone(&self.inner),
            label: self.label,
        }
    }
}

impl<S: RecordSource> Reconciler<S> {
    /// Create an uninitialized collection. `label` tags log lines.
    pub fn new(source: S, derived: DerivedFields<S::Record>, label: &'static str) -> Self {
        Self {
            source: Arc::new(source),
            derived: Arc::new(derived),
            inner: Arc::new(RwLock::new(Inner {
                records: Vec::new(),
                settled: SyncState::Uninitialized,
                loading: false,
                in_flight: 0,
            })),
            label,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn derived(&self) -> &DerivedFields<S::Record> {
        &self.derived
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Copy of the current collection, in presentation order.
    pub fn snapshot(&self) -> Vec<S::Record> {
        self.read().records.clone()
    }

    pub fn get(&self, key: &str) -> Option<S::Record> {
        self.read().records.iter().find(|r| r.key() == key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().records.iter().any(|r| r.key() == key)
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    pub fn state(&self) -> SyncState {
        let inner = self.read();
        if inner.in_flight > 0 && inner.settled == SyncState::Synced {
            SyncState::Fetching
        } else {
            inner.settled
        }
    }

    /// True only while the first load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// First load. A failure presents an empty collection.
    pub async fn load(&self) -> SyncState {
        self.load_with(&PollLease::detached()).await
    }

    pub(crate) async fn load_with(&self, lease: &PollLease) -> SyncState {
        self.write().loading = true;
        let fetched = self.source.fetch_all().await;

        let state = match fetched {
            Ok(records) => {
                let (records, corrections) = self.correct_all(records).await;
                if !lease.is_active() {
                    self.write().loading = false;
                    return self.state();
                }
                let mut inner = self.write();
                inner.records = dedupe_by_key(records);
                inner.settled = SyncState::Synced;
                tracing::info!(
                    collection = self.label,
                    records = inner.records.len(),
                    corrections,
                    "Initial load complete"
                );
                SyncState::Synced
            }
            Err(e) => {
                tracing::warn!(
                    collection = self.label,
                    error = %e,
                    "Initial load failed, showing empty collection"
                );
                let mut inner = self.write();
                inner.records.clear();
                inner.settled = SyncState::Empty;
                SyncState::Empty
            }
        };

        self.write().loading = false;
        state
    }

    /// Background refresh: replace the collection with a fresh snapshot, or
    /// keep it unchanged if the fetch fails.
    pub async fn poll(&self) -> PollOutcome {
        self.poll_with(&PollLease::detached()).await
    }

    pub(crate) async fn poll_with(&self, lease: &PollLease) -> PollOutcome {
        let _in_flight = InFlight::enter(&self.inner);
        let fetched = self.source.fetch_all().await;

        match fetched {
            Ok(records) => {
                if !lease.is_active() {
                    return PollOutcome::Discarded;
                }
                let (records, corrections) = self.correct_all(records).await;
                if !lease.is_active() {
                    return PollOutcome::Discarded;
                }
                let mut inner = self.write();
                inner.records = dedupe_by_key(records);
                inner.settled = SyncState::Synced;
                tracing::debug!(
                    collection = self.label,
                    records = inner.records.len(),
                    corrections,
                    "Poll applied"
                );
                PollOutcome::Applied {
                    records: inner.records.len(),
                    corrections,
                }
            }
            Err(e) => {
                tracing::warn!(collection = self.label, error = %e, "Poll failed, keeping previous data");
                PollOutcome::Failed
            }
        }
    }

    // ========================================================================
    // Derived-field correction
    // ========================================================================

    async fn correct_all(&self, mut records: Vec<S::Record>) -> (Vec<S::Record>, usize) {
        if self.derived.is_empty() {
            return (records, 0);
        }
        let mut corrections = 0;
        for record in records.iter_mut() {
            corrections += self.drift_correct(record).await;
        }
        (records, corrections)
    }

    /// Bring every derived field of `record` back in line with its source
    /// fields, issuing one remote update per drifted field.
    ///
    /// The corrected value is adopted locally whether or not the remote
    /// update succeeds. Returns the number of updates issued; a consistent
    /// record issues none.
    pub async fn drift_correct(&self, record: &mut S::Record) -> usize {
        let drift = match self.derived.drift(record) {
            Ok(drift) => drift,
            Err(e) => {
                tracing::warn!(collection = self.label, error = %e, "Could not evaluate derived fields");
                return 0;
            }
        };
        if drift.is_empty() {
            return 0;
        }

        let key = record.key().to_string();
        let mut corrected = Map::new();
        for (field, value) in &drift {
            match self.source.update_field(&key, field, value).await {
                Ok(()) => {
                    tracing::debug!(collection = self.label, key = %key, field, "Corrected derived field")
                }
                Err(e) => tracing::warn!(
                    collection = self.label,
                    key = %key,
                    field,
                    error = %e,
                    "Corrective update failed"
                ),
            }
            corrected.insert(field.to_string(), value.clone());
        }

        match merge_fields(record, &corrected) {
            Ok(merged) => *record = merged,
            Err(e) => {
                tracing::warn!(collection = self.label, key = %key, error = %e, "Could not apply correction")
            }
        }
        drift.len()
    }

    // ========================================================================
    // Local overlay
    // ========================================================================

    /// Append `record` unless its key is already present.
    pub fn apply_local_insert(&self, record: S::Record) -> bool {
        let mut inner = self.write();
        if inner.records.iter().any(|r| r.key() == record.key()) {
            return false;
        }
        inner.records.push(record);
        true
    }

    /// Merge `fields` into the record with `key`, if present.
    ///
    /// Derived fields are recomputed from the merged record locally; the
    /// remote copy is corrected by the next poll.
    pub fn apply_local_patch(&self, key: &str, fields: &Map<String, Value>) -> Result<bool> {
        let mut inner = self.write();
        let Some(slot) = inner.records.iter_mut().find(|r| r.key() == key) else {
            return Ok(false);
        };
        let merged = merge_fields(slot, fields)?;
        *slot = self.rederive(merged);
        Ok(true)
    }

    fn rederive(&self, record: S::Record) -> S::Record {
        let drift = match self.derived.drift(&record) {
            Ok(drift) if !drift.is_empty() => drift,
            Ok(_) => return record,
            Err(e) => {
                tracing::warn!(collection = self.label, error = %e, "Could not evaluate derived fields");
                return record;
            }
        };
        let derived: Map<String, Value> = drift
            .into_iter()
            .map(|(field, value)| (field.to_string(), value))
            .collect();
        match merge_fields(&record, &derived) {
            Ok(merged) => merged,
            Err(e) => {
                tracing::warn!(collection = self.label, key = %record.key(), error = %e, "Could not apply correction");
                record
            }
        }
    }

    /// Drop the record with `key`, returning it if it was present.
    pub fn apply_local_delete(&self, key: &str) -> Option<S::Record> {
        let mut inner = self.write();
        let index = inner.records.iter().position(|r| r.key() == key)?;
        Some(inner.records.remove(index))
    }

    // ========================================================================
    // Mutations (remote first, then local)
    // ========================================================================

    /// Persist a new record, then insert it locally.
    pub async fn create(&self, record: S::Record) -> Result<()> {
        self.source.create(&record).await?;
        let key = record.key().to_string();
        if !self.apply_local_insert(record) {
            tracing::debug!(collection = self.label, key = %key, "Created record already present");
        }
        Ok(())
    }

    /// Persist `fields` one at a time, then merge them locally.
    ///
    /// Stops at the first failed field. Fields persisted before the failure
    /// are still merged locally, and the failure is returned.
    pub async fn update(&self, key: &str, fields: Vec<(String, Value)>) -> Result<()> {
        if let Some(current) = self.get(key) {
            let preview: Map<String, Value> = fields.iter().cloned().collect();
            merge_fields(&current, &preview)?;
        }

        let mut persisted = Map::new();
        for (field, value) in fields {
            if let Err(e) = self.source.update_field(key, &field, &value).await {
                if !persisted.is_empty() {
                    tracing::warn!(
                        collection = self.label,
                        key = %key,
                        persisted = persisted.len(),
                        failed_field = %field,
                        "Update partially applied"
                    );
                    self.apply_local_patch(key, &persisted)?;
                }
                return Err(e);
            }
            persisted.insert(field, value);
        }

        self.apply_local_patch(key, &persisted)?;
        Ok(())
    }

    /// Delete remotely, then drop the record locally.
    pub async fn remove(&self, key: &str) -> Result<S::Record> {
        let current = self
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        self.source.delete(key).await?;
        Ok(self.apply_local_delete(key).unwrap_or(current))
    }

    // ========================================================================
    // Locking
    // ========================================================================

    fn read(&self) -> RwLockReadGuard<'_, Inner<S::Record>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<S::Record>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: RecordSource> Pollable for Reconciler<S> {
    async fn initial(&self, lease: &PollLease) {
        self.load_with(lease).await;
    }

    async fn tick(&self, lease: &PollLease) {
        self.poll_with(lease).await;
    }
}

/// Counts a poll as in flight until dropped, including when the poll's task
/// is aborted mid-fetch.
struct InFlight<R> {
    inner: Arc<RwLock<Inner<R>>>,
}

impl<R> InFlight<R> {
    fn enter(inner: &Arc<RwLock<Inner<R>>>) -> Self {
        inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight += 1;
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl<R> Drop for InFlight<R> {
    fn drop(&mut self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

/// Keep one record per key. A later duplicate replaces the earlier one in
/// the earlier one's position.
fn dedupe_by_key<R: SyncRecord>(records: Vec<R>) -> Vec<R> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<R> = Vec::with_capacity(records.len());
    for record in records {
        match positions.get(record.key()) {
            Some(&index) => out[index] = record,
            None => {
                positions.insert(record.key().to_string(), out.len());
                out.push(record);
            }
        }
    }
    out
}
