//! Driver roster synchronizer
//!
//! The roster is the signed-in user's drivers, reconciled against the
//! drivers service. A driver's `driving` flag is derived from its status and
//! is corrected on every poll.

use std::cmp::Ordering;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::api::DriversClient;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::sync::{
    DerivedFields, PollHandle, PollOutcome, Poller, RecordSource, Reconciler, SyncState,
};
use crate::types::{generate_id, DriverRecord, DriverStatus, EmergencyContact, FieldPatch};

/// The drivers service, scoped to one signed-in user.
#[derive(Debug, Clone)]
pub struct RosterSource {
    drivers: DriversClient,
    session: Session,
}

impl RosterSource {
    pub fn new(drivers: DriversClient, session: Session) -> Self {
        Self { drivers, session }
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }
}

impl RecordSource for RosterSource {
    type Record = DriverRecord;

    async fn fetch_all(&self) -> Result<Vec<DriverRecord>> {
        self.drivers.roster(self.user_id()).await
    }

    async fn create(&self, record: &DriverRecord) -> Result<()> {
        self.drivers.create(record, self.user_id()).await
    }

    async fn update_field(&self, key: &str, field: &str, value: &Value) -> Result<()> {
        let patch = FieldPatch::new(field, value.clone()).with_user(self.user_id());
        self.drivers.update_field(key, &patch).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.drivers.delete(key, self.user_id()).await
    }
}

/// Derived fields of a driver: `driving` is true iff status is not idle.
pub fn driver_fields() -> DerivedFields<DriverRecord> {
    DerivedFields::new().with("driving", |d: &DriverRecord| {
        Value::Bool(d.status.is_driving())
    })
}

/// The reconciled roster.
pub struct RosterSync<S: RecordSource<Record = DriverRecord> = RosterSource> {
    reconciler: Reconciler<S>,
}

impl<S: RecordSource<Record = DriverRecord>> Clone for RosterSync<S> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
        }
    }
}

impl RosterSync<RosterSource> {
    /// Roster for the signed-in user. Requires a [`Session`].
    pub fn connect(drivers: DriversClient, session: &Session) -> Self {
        Self::with_source(RosterSource::new(drivers, session.clone()))
    }

    /// Append one emergency contact through the drivers service's contact
    /// endpoint, then to the local record.
    pub async fn add_contact(&self, driver_id: &str, contact: ContactDraft) -> Result<EmergencyContact> {
        let current = self
            .reconciler
            .get(driver_id)
            .ok_or_else(|| Error::NotFound(driver_id.to_string()))?;
        let contact = contact
            .into_contact()
            .ok_or_else(|| Error::InvalidPatch("contact needs a name or phone number".to_string()))?;

        let source = self.reconciler.source();
        source
            .drivers
            .add_emergency_contact(driver_id, source.user_id(), &contact)
            .await?;

        let mut contacts = current.emergency_contacts;
        contacts.push(contact.clone());
        let mut fields = Map::new();
        fields.insert("emergency_contacts".to_string(), json!(contacts));
        self.reconciler.apply_local_patch(driver_id, &fields)?;
        Ok(contact)
    }
}

impl<S: RecordSource<Record = DriverRecord>> RosterSync<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            reconciler: Reconciler::new(source, driver_fields(), "roster"),
        }
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

    /// Start background polling; stops when the handle is dropped.
    pub fn spawn_polling(&self, period: Duration) -> PollHandle {
        Poller::new("roster", period).spawn(self.reconciler.clone())
    }

    pub fn drivers(&self) -> Vec<DriverRecord> {
        self.reconciler.snapshot()
    }

    pub fn driver(&self, driver_id: &str) -> Option<DriverRecord> {
        self.reconciler.get(driver_id)
    }

    pub fn state(&self) -> SyncState {
        self.reconciler.state()
    }

    /// The roster as `view` presents it.
    pub fn view(&self, view: &RosterView) -> Vec<DriverRecord> {
        view.apply(&self.reconciler.snapshot())
    }

    /// Create a driver from a draft and add it to the roster.
    pub async fn add(&self, draft: DriverDraft) -> Result<DriverRecord> {
        let record = draft.into_record()?;
        self.reconciler.create(record.clone()).await?;
        Ok(record)
    }

    /// Persist the fields an edit changed, one patch per field.
    pub async fn save_edit(&self, edit: &DriverEdit) -> Result<()> {
        let original = self
            .reconciler
            .get(&edit.driver_id)
            .ok_or_else(|| Error::NotFound(edit.driver_id.clone()))?;
        self.reconciler
            .update(&edit.driver_id, edit.changes(&original))
            .await
    }

    /// Set a driver's status. `driving` is re-derived locally and
    /// corrected on the service by the next poll.
    pub async fn set_status(&self, driver_id: &str, status: DriverStatus) -> Result<()> {
        self.reconciler
            .update(driver_id, vec![("status".to_string(), json!(status.as_str()))])
            .await
    }

    pub async fn remove(&self, driver_id: &str) -> Result<DriverRecord> {
        self.reconciler.remove(driver_id).await
    }
}

// ============================================
// Drafts and edits
// ============================================

/// A contact as entered: first and last name kept apart until saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl ContactDraft {
    fn into_contact(self) -> Option<EmergencyContact> {
        let name = join_name(&self.first_name, &self.last_name);
        let phone_number = self.phone_number.trim().to_string();
        if name.is_empty() && phone_number.is_empty() {
            return None;
        }
        Some(EmergencyContact { name, phone_number })
    }
}

/// Input for a new driver.
#[derive(Debug, Clone, Default)]
pub struct DriverDraft {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub product_id: Option<String>,
    pub profile_pic: Option<String>,
    pub emergency_contacts: Vec<ContactDraft>,
}

impl DriverDraft {
    /// Build the record sent on creation: idle, not driving, fresh id.
    pub fn into_record(self) -> Result<DriverRecord> {
        let name = join_name(&self.first_name, &self.last_name);
        if name.is_empty() {
            return Err(Error::InvalidPatch("driver name is required".to_string()));
        }

        let mut record = DriverRecord::new(generate_id("driver", &name), name);
        record.phone_number = non_empty(self.phone_number);
        record.profile_pic = self.profile_pic.and_then(non_empty);
        record.product_id = self.product_id.and_then(non_empty).map(Value::String);
        record.emergency_contacts = self
            .emergency_contacts
            .into_iter()
            .filter_map(ContactDraft::into_contact)
            .collect();
        Ok(record)
    }
}

/// An edit to an existing driver.
#[derive(Debug, Clone)]
pub struct DriverEdit {
    pub driver_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub emergency_contacts: Vec<ContactDraft>,
}

impl DriverEdit {
    /// Start an edit from the current record, splitting the name at the
    /// first space.
    pub fn from_record(driver: &DriverRecord) -> Self {
        let (first_name, last_name) = split_name(&driver.name);
        Self {
            driver_id: driver.driver_id.clone(),
            first_name,
            last_name,
            phone_number: driver.phone_number.clone().unwrap_or_default(),
            emergency_contacts: driver
                .emergency_contacts
                .iter()
                .map(|c| {
                    let (first_name, last_name) = split_name(&c.name);
                    ContactDraft {
                        first_name,
                        last_name,
                        phone_number: c.phone_number.clone(),
                    }
                })
                .collect(),
        }
    }

    /// Field patches for this edit against `original`, in send order.
    ///
    /// Name and phone are sent only when changed; emergency contacts are
    /// always sent.
    pub fn changes(&self, original: &DriverRecord) -> Vec<(String, Value)> {
        let mut fields = Vec::new();

        let name = join_name(&self.first_name, &self.last_name);
        if !name.is_empty() && name != original.name {
            fields.push(("name".to_string(), Value::String(name)));
        }

        let phone = self.phone_number.trim();
        if phone != original.phone_number.as_deref().unwrap_or("") {
            fields.push(("phone_number".to_string(), Value::String(phone.to_string())));
        }

        let contacts: Vec<EmergencyContact> = self
            .emergency_contacts
            .iter()
            .cloned()
            .filter_map(ContactDraft::into_contact)
            .collect();
        fields.push(("emergency_contacts".to_string(), json!(contacts)));

        fields
    }
}

fn join_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

fn split_name(name: &str) -> (String, String) {
    match name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.trim().to_string(), String::new()),
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================
// Presentation order
// ============================================

/// Roster ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    /// Most severe status first
    Severity,
    Alphabetical,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Severity => "severity",
            SortOrder::Alphabetical => "alphabetical",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "severity" | "status" => Ok(SortOrder::Severity),
            "alphabetical" | "name" | "az" => Ok(SortOrder::Alphabetical),
            other => Err(Error::Config(format!("unknown sort order: {}", other))),
        }
    }
}

/// Sort and search settings of the roster listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterView {
    pub sort: SortOrder,
    pub search: Option<String>,
}

impl RosterView {
    pub fn new(sort: SortOrder) -> Self {
        Self { sort, search: None }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn apply(&self, drivers: &[DriverRecord]) -> Vec<DriverRecord> {
        arrange(drivers, self.sort, self.search.as_deref())
    }
}

/// Filter by case-insensitive name substring, then sort. Sorting is stable,
/// so ties keep server order. Drivers without a creation time sort after
/// dated ones in both chronological orders.
pub fn arrange(drivers: &[DriverRecord], sort: SortOrder, search: Option<&str>) -> Vec<DriverRecord> {
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut out: Vec<DriverRecord> = drivers
        .iter()
        .filter(|d| match &needle {
            Some(needle) => d.name.to_lowercase().contains(needle),
            None => true,
        })
        .cloned()
        .collect();

    match sort {
        SortOrder::Newest => out.sort_by(|a, b| by_created(a, b, true)),
        SortOrder::Oldest => out.sort_by(|a, b| by_created(a, b, false)),
        SortOrder::Severity => out.sort_by(|a, b| b.status.cmp(&a.status)),
        SortOrder::Alphabetical => {
            out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
    }
    out
}

fn by_created(a: &DriverRecord, b: &DriverRecord, newest_first: bool) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) if newest_first => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
