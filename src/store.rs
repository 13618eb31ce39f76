//! Record storage behind an async trait. The engine only ever sees
//! [`DataStore`]; the in-memory backend keeps every collection as an ordered
//! `Vec` because list order is semantic (rosters and assignment lists are
//! rebuilt positionally).

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Record kind + id that failed to resolve.
    NotFound(&'static str, String),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Partial updates ──────────────────────────────────────────────
//
// Every update replaces whole fields: a `Some` list replaces the stored list,
// never merges into it. For the optional string fields on Activity and
// Personnel, `Some("")` clears the field.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub personnel_needed: Option<u32>,
    pub assets_needed: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location_id: Option<String>,
    pub activity_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub column: Option<String>,
    pub support_personnel_required: Option<Vec<RequiredSlot>>,
    pub assets_required: Option<Vec<RequiredSlot>>,
    pub assigned_personnel: Option<Vec<PersonnelEntry>>,
    pub assigned_assets: Option<Vec<AssetEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub details: Option<String>,
    pub availability: Option<Vec<AvailabilityWindow>>,
    pub assigned_personnel: Option<Vec<OperatorEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonnelPatch {
    pub name: Option<String>,
    pub cap_id: Option<String>,
    pub rank: Option<String>,
    pub specialties: Option<String>,
    pub availability: Option<Vec<AvailabilityWindow>>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocationPatch {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

fn set_opt(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = if v.is_empty() { None } else { Some(v) };
    }
}

// ── Store trait ──────────────────────────────────────────────────

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;
    async fn create_event(&self, event: Event) -> Result<Event, StoreError>;
    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<Event, StoreError>;
    /// Deleting an event deletes its activities with it.
    async fn delete_event(&self, id: &str) -> Result<(), StoreError>;

    async fn list_activities(&self, event_id: Option<&str>) -> Result<Vec<Activity>, StoreError>;
    async fn create_activity(&self, activity: Activity) -> Result<Activity, StoreError>;
    async fn update_activity(&self, id: &str, patch: ActivityPatch) -> Result<Activity, StoreError>;
    async fn delete_activity(&self, id: &str) -> Result<(), StoreError>;

    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;
    async fn create_asset(&self, asset: Asset) -> Result<Asset, StoreError>;
    async fn update_asset(&self, id: &str, patch: AssetPatch) -> Result<Asset, StoreError>;
    async fn delete_asset(&self, id: &str) -> Result<(), StoreError>;

    async fn list_personnel(&self) -> Result<Vec<Personnel>, StoreError>;
    async fn create_personnel(&self, person: Personnel) -> Result<Personnel, StoreError>;
    async fn update_personnel(&self, id: &str, patch: PersonnelPatch) -> Result<Personnel, StoreError>;
    async fn delete_personnel(&self, id: &str) -> Result<(), StoreError>;

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;
    async fn create_location(&self, location: Location) -> Result<Location, StoreError>;
    async fn update_location(&self, id: &str, patch: LocationPatch) -> Result<Location, StoreError>;
    async fn delete_location(&self, id: &str) -> Result<(), StoreError>;
}

// ── In-memory backend ────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<Event>>,
    activities: RwLock<Vec<Activity>>,
    assets: RwLock<Vec<Asset>>,
    personnel: RwLock<Vec<Personnel>>,
    locations: RwLock<Vec<Location>>,
}

fn read_lock<T>(lock: &RwLock<Vec<T>>) -> Result<RwLockReadGuard<'_, Vec<T>>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("store lock poisoned".into()))
}

fn write_lock<T>(lock: &RwLock<Vec<T>>) -> Result<RwLockWriteGuard<'_, Vec<T>>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("store lock poisoned".into()))
}

fn new_id() -> String {
    Ulid::new().to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(read_lock(&self.events)?.clone())
    }

    async fn create_event(&self, mut event: Event) -> Result<Event, StoreError> {
        event.id = new_id();
        event.created_at = now();
        if event.status.is_empty() {
            event.status = "upcoming".into();
        }
        write_lock(&self.events)?.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: &str, patch: EventPatch) -> Result<Event, StoreError> {
        let mut events = write_lock(&self.events)?;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound("event", id.into()))?;
        if let Some(v) = patch.title {
            event.title = v;
        }
        if let Some(v) = patch.description {
            event.description = v;
        }
        if let Some(v) = patch.start_date {
            event.start_date = v;
        }
        if let Some(v) = patch.end_date {
            event.end_date = v;
        }
        if let Some(v) = patch.status {
            event.status = v;
        }
        if let Some(v) = patch.personnel_needed {
            event.personnel_needed = v;
        }
        if let Some(v) = patch.assets_needed {
            event.assets_needed = v;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<(), StoreError> {
        let mut events = write_lock(&self.events)?;
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(StoreError::NotFound("event", id.into()));
        }
        // Cascade: an event's activities never outlive it.
        write_lock(&self.activities)?.retain(|a| a.event_id != id);
        Ok(())
    }

    async fn list_activities(&self, event_id: Option<&str>) -> Result<Vec<Activity>, StoreError> {
        let activities = read_lock(&self.activities)?;
        Ok(match event_id {
            Some(ev) => activities.iter().filter(|a| a.event_id == ev).cloned().collect(),
            None => activities.clone(),
        })
    }

    async fn create_activity(&self, mut activity: Activity) -> Result<Activity, StoreError> {
        activity.id = new_id();
        activity.created_at = now();
        if activity.column.is_empty() {
            activity.column = columns::PLANNING.into();
        }
        write_lock(&self.activities)?.push(activity.clone());
        Ok(activity)
    }

    async fn update_activity(&self, id: &str, patch: ActivityPatch) -> Result<Activity, StoreError> {
        let mut activities = write_lock(&self.activities)?;
        let activity = activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound("activity", id.into()))?;
        if let Some(v) = patch.title {
            activity.title = v;
        }
        if let Some(v) = patch.description {
            activity.description = v;
        }
        set_opt(&mut activity.location_id, patch.location_id);
        set_opt(&mut activity.activity_date, patch.activity_date);
        set_opt(&mut activity.start_time, patch.start_time);
        set_opt(&mut activity.end_time, patch.end_time);
        if let Some(v) = patch.column {
            activity.column = v;
        }
        if let Some(v) = patch.support_personnel_required {
            activity.support_personnel_required = v;
        }
        if let Some(v) = patch.assets_required {
            activity.assets_required = v;
        }
        if let Some(v) = patch.assigned_personnel {
            activity.assigned_personnel = v;
        }
        if let Some(v) = patch.assigned_assets {
            activity.assigned_assets = v;
        }
        Ok(activity.clone())
    }

    async fn delete_activity(&self, id: &str) -> Result<(), StoreError> {
        let mut activities = write_lock(&self.activities)?;
        let before = activities.len();
        activities.retain(|a| a.id != id);
        if activities.len() == before {
            return Err(StoreError::NotFound("activity", id.into()));
        }
        Ok(())
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        Ok(read_lock(&self.assets)?.clone())
    }

    async fn create_asset(&self, mut asset: Asset) -> Result<Asset, StoreError> {
        asset.id = new_id();
        asset.created_at = now();
        write_lock(&self.assets)?.push(asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, id: &str, patch: AssetPatch) -> Result<Asset, StoreError> {
        let mut assets = write_lock(&self.assets)?;
        let asset = assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound("asset", id.into()))?;
        if let Some(v) = patch.name {
            asset.name = v;
        }
        if let Some(v) = patch.kind {
            asset.kind = v;
        }
        if let Some(v) = patch.details {
            asset.details = v;
        }
        if let Some(v) = patch.availability {
            asset.availability = v;
        }
        if let Some(v) = patch.assigned_personnel {
            asset.assigned_personnel = v;
        }
        Ok(asset.clone())
    }

    async fn delete_asset(&self, id: &str) -> Result<(), StoreError> {
        let mut assets = write_lock(&self.assets)?;
        let before = assets.len();
        assets.retain(|a| a.id != id);
        if assets.len() == before {
            return Err(StoreError::NotFound("asset", id.into()));
        }
        Ok(())
    }

    async fn list_personnel(&self) -> Result<Vec<Personnel>, StoreError> {
        Ok(read_lock(&self.personnel)?.clone())
    }

    async fn create_personnel(&self, mut person: Personnel) -> Result<Personnel, StoreError> {
        person.id = new_id();
        person.created_at = now();
        if person.status.is_empty() {
            person.status = "available".into();
        }
        write_lock(&self.personnel)?.push(person.clone());
        Ok(person)
    }

    async fn update_personnel(&self, id: &str, patch: PersonnelPatch) -> Result<Personnel, StoreError> {
        let mut personnel = write_lock(&self.personnel)?;
        let person = personnel
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound("personnel", id.into()))?;
        if let Some(v) = patch.name {
            person.name = v;
        }
        if let Some(v) = patch.cap_id {
            person.cap_id = v;
        }
        if let Some(v) = patch.rank {
            person.rank = v;
        }
        if let Some(v) = patch.specialties {
            person.specialties = v;
        }
        if let Some(v) = patch.availability {
            person.availability = v;
        }
        if let Some(v) = patch.status {
            person.status = v;
        }
        set_opt(&mut person.assigned_to, patch.assigned_to);
        Ok(person.clone())
    }

    async fn delete_personnel(&self, id: &str) -> Result<(), StoreError> {
        let mut personnel = write_lock(&self.personnel)?;
        let before = personnel.len();
        personnel.retain(|p| p.id != id);
        if personnel.len() == before {
            return Err(StoreError::NotFound("personnel", id.into()));
        }
        Ok(())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        Ok(read_lock(&self.locations)?.clone())
    }

    async fn create_location(&self, mut location: Location) -> Result<Location, StoreError> {
        location.id = new_id();
        location.created_at = now();
        write_lock(&self.locations)?.push(location.clone());
        Ok(location)
    }

    async fn update_location(&self, id: &str, patch: LocationPatch) -> Result<Location, StoreError> {
        let mut locations = write_lock(&self.locations)?;
        let location = locations
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound("location", id.into()))?;
        if let Some(v) = patch.name {
            location.name = v;
        }
        if let Some(v) = patch.street {
            location.street = v;
        }
        if let Some(v) = patch.city {
            location.city = v;
        }
        if let Some(v) = patch.state {
            location.state = v;
        }
        if let Some(v) = patch.zip {
            location.zip = v;
        }
        if let Some(v) = patch.lat {
            location.lat = v;
        }
        if let Some(v) = patch.lng {
            location.lng = v;
        }
        Ok(location.clone())
    }

    async fn delete_location(&self, id: &str) -> Result<(), StoreError> {
        let mut locations = write_lock(&self.locations)?;
        let before = locations.len();
        locations.retain(|l| l.id != id);
        if locations.len() == before {
            return Err(StoreError::NotFound("location", id.into()));
        }
        Ok(())
    }
}

// ── Demo seed ────────────────────────────────────────────────────

fn all_week(start_date: &str, end_date: &str) -> AvailabilityWindow {
    AvailabilityWindow {
        label: "All Week".into(),
        start_date: start_date.into(),
        end_date: end_date.into(),
        start_time: "06:00".into(),
        end_time: "22:00".into(),
        ..AvailabilityWindow::default()
    }
}

impl MemoryStore {
    /// Loads a small deterministic demo dataset: one event with activities on
    /// 2026-06-08/09, a van with a rostered driver, and a handful of people.
    pub async fn seed_demo(&self) -> Result<(), StoreError> {
        let hq = self
            .create_location(Location {
                name: "Squadron HQ".into(),
                street: "214 Hangar Rd".into(),
                city: "Cedar Falls".into(),
                state: "IA".into(),
                zip: "50613".into(),
                ..Location::default()
            })
            .await?;
        let airfield = self
            .create_location(Location {
                name: "Municipal Airfield".into(),
                street: "1 Aviation Way".into(),
                city: "Waterloo".into(),
                state: "IA".into(),
                zip: "50703".into(),
                ..Location::default()
            })
            .await?;

        let jane = self
            .create_personnel(Personnel {
                name: "Jane Harmon".into(),
                cap_id: "610423".into(),
                rank: "C/Capt".into(),
                availability: vec![all_week("2026-06-08", "2026-06-12")],
                ..Personnel::default()
            })
            .await?;
        self.create_personnel(Personnel {
            name: "Bob Reyes".into(),
            cap_id: "587211".into(),
            rank: "C/Amn".into(),
            availability: vec![all_week("2026-06-08", "2026-06-12")],
            ..Personnel::default()
        })
        .await?;
        self.create_personnel(Personnel {
            name: "Priya Nair".into(),
            cap_id: "602998".into(),
            rank: "C/SSgt".into(),
            availability: vec![all_week("2026-06-08", "2026-06-09")],
            ..Personnel::default()
        })
        .await?;
        self.create_personnel(Personnel {
            name: "Marcus Webb".into(),
            cap_id: "594307".into(),
            rank: "Maj".into(),
            ..Personnel::default()
        })
        .await?;

        self.create_asset(Asset {
            name: "Van 12".into(),
            kind: "12 Passenger Van".into(),
            details: "448291".into(),
            availability: vec![all_week("2026-06-08", "2026-06-12")],
            assigned_personnel: vec![Entry::Record(OperatorAssignment {
                personnel_id: jane.id.clone(),
                role: roles::DRIVER.into(),
                assignment_date: "2026-06-08".into(),
                assignment_start_time: "06:00".into(),
                assignment_end_time: "18:00".into(),
                ..OperatorAssignment::default()
            })],
            ..Asset::default()
        })
        .await?;
        self.create_asset(Asset {
            name: "SUV 3".into(),
            kind: "SUV".into(),
            details: "771054".into(),
            availability: vec![all_week("2026-06-08", "2026-06-12")],
            ..Asset::default()
        })
        .await?;

        let encampment = self
            .create_event(Event {
                title: "Encampment 2026".into(),
                description: "Annual summer encampment".into(),
                start_date: "2026-06-08".into(),
                end_date: "2026-06-12".into(),
                personnel_needed: 12,
                assets_needed: 3,
                ..Event::default()
            })
            .await?;

        self.create_activity(Activity {
            event_id: encampment.id.clone(),
            title: "Orientation Flights".into(),
            location_id: Some(airfield.id.clone()),
            activity_date: Some("2026-06-08".into()),
            start_time: Some("08:00".into()),
            end_time: Some("10:00".into()),
            support_personnel_required: vec![
                RequiredSlot::Name("Safety Officer".into()),
                RequiredSlot::Name("Medic".into()),
            ],
            assets_required: vec![RequiredSlot::Name("12 Passenger Van".into())],
            ..Activity::default()
        })
        .await?;
        self.create_activity(Activity {
            event_id: encampment.id.clone(),
            title: "Drill and Ceremonies".into(),
            location_id: Some(hq.id.clone()),
            activity_date: Some("2026-06-08".into()),
            start_time: Some("13:00".into()),
            end_time: Some("15:00".into()),
            support_personnel_required: vec![RequiredSlot::Name("Drill Instructor".into())],
            ..Activity::default()
        })
        .await?;
        self.create_activity(Activity {
            event_id: encampment.id,
            title: "Land Navigation".into(),
            activity_date: Some("2026-06-09".into()),
            start_time: Some("09:00".into()),
            end_time: Some("12:00".into()),
            ..Activity::default()
        })
        .await?;

        Ok(())
    }
}
