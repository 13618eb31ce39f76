mod availability;
mod conflict;
mod coverage;
mod error;
mod fulfillment;
mod mutations;
mod normalize;
mod queries;

pub use availability::{availability_windows, covers, is_resource_available};
pub use conflict::{find_conflicts, roster_overlap, ResourceKind};
pub use coverage::{
    asset_has_driver_for_activity, asset_has_driver_on_date, driver_for_window,
    is_driver_assigned_to_vehicle,
};
pub use error::EngineError;
pub use fulfillment::{
    assigned_asset_count, assigned_personnel_count, event_activity_totals, is_fully_assigned,
    required_count,
};
pub use normalize::{
    normalize_availability, normalize_entries, normalize_required, to_asset_payload,
    to_operator_payload, to_personnel_payload,
};
pub use queries::personal_schedule;

use std::sync::Arc;

use serde::Serialize;

use crate::model::*;
use crate::store::DataStore;

/// Roles whose sessions run the reconcile-and-promote pass on refresh.
pub fn is_privileged_role(role: &str) -> bool {
    let r = role.trim();
    r.eq_ignore_ascii_case("admin") || r.eq_ignore_ascii_case("staff")
}

/// One coherent read of every collection. Derived state (coverage, conflicts,
/// fulfillment) is always computed from a snapshot, never cached beyond it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub events: Vec<Event>,
    pub activities: Vec<Activity>,
    pub assets: Vec<Asset>,
    pub personnel: Vec<Personnel>,
    pub locations: Vec<Location>,
}

pub struct Engine {
    pub(super) store: Arc<dyn DataStore>,
    privileged: bool,
}

impl Engine {
    pub fn new(store: Arc<dyn DataStore>, privileged: bool) -> Self {
        Self { store, privileged }
    }

    pub fn privileged(&self) -> bool {
        self.privileged
    }

    /// One parallel fetch of every collection.
    pub async fn load_snapshot(&self) -> Result<Snapshot, EngineError> {
        let (events, activities, assets, personnel, locations) = tokio::try_join!(
            self.store.list_events(),
            self.store.list_activities(None),
            self.store.list_assets(),
            self.store.list_personnel(),
            self.store.list_locations(),
        )?;
        Ok(Snapshot { events, activities, assets, personnel, locations })
    }

    /// Load, and for privileged sessions reconcile operator coverage and
    /// promote fully staffed Planning activities. Re-reads only when a pass
    /// actually wrote, so an already-consistent store costs one fetch.
    pub async fn refresh(&self) -> Result<Snapshot, EngineError> {
        let mut snap = self.load_snapshot().await?;
        if !self.privileged {
            return Ok(snap);
        }
        if self.sync_all_operators(&snap).await? > 0 {
            snap = self.load_snapshot().await?;
        }
        if self.auto_promote_ready(&snap.activities).await? > 0 {
            snap = self.load_snapshot().await?;
        }
        Ok(snap)
    }
}
