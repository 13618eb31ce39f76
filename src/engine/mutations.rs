use futures::future::try_join_all;
use tracing::{debug, info};

use crate::limits::{MAX_LIST_ENTRIES, MAX_NAME_LEN};
use crate::model::*;
use crate::store::{
    ActivityPatch, AssetPatch, EventPatch, LocationPatch, PersonnelPatch, StoreError,
};

use super::availability::covers;
use super::conflict::{find_conflicts, roster_overlap, ResourceKind};
use super::coverage::{covered_by_any, driver_for_window};
use super::fulfillment::is_fully_assigned;
use super::normalize::{
    normalize_entries, to_asset_payload, to_operator_payload, to_personnel_payload,
};
use super::{Engine, EngineError};

// Every mutator reads fresh, validates against the pure parts, and only then
// writes. All list writes go through the payload builders, so a mutation is
// also a cleanup pass over whatever legacy shapes the list held.

fn check_name(value: &str, what: &'static str) -> Result<(), EngineError> {
    if value.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn check_list<T>(list: &[T], what: &'static str) -> Result<(), EngineError> {
    if list.len() > MAX_LIST_ENTRIES {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn rejected(reason: &'static str) {
    metrics::counter!(crate::observability::ASSIGNMENTS_REJECTED_TOTAL, "reason" => reason)
        .increment(1);
}

fn not_found(kind: &'static str, id: &str) -> EngineError {
    EngineError::NotFound { kind, id: id.to_string() }
}

// ── Activity assignments ─────────────────────────────────────────

impl Engine {
    pub async fn assign_personnel_to_activity(
        &self,
        activity_id: &str,
        personnel_id: &str,
        role: &str,
        start: &str,
        end: &str,
        force: bool,
    ) -> Result<(), EngineError> {
        let (activities, personnel) =
            tokio::try_join!(self.store.list_activities(None), self.store.list_personnel())?;
        let activity = activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| not_found("activity", activity_id))?;
        let person = personnel
            .iter()
            .find(|p| p.id == personnel_id)
            .ok_or_else(|| not_found("personnel", personnel_id))?;

        let current = normalize_entries(&activity.assigned_personnel);
        if current.iter().any(|e| e.id == personnel_id) {
            rejected("duplicate");
            return Err(EngineError::AlreadyAssigned { kind: "staff member" });
        }

        // Manual entries never carry a date; the window always resolves
        // against the activity.
        let mut candidate = Assignment::bare(personnel_id);
        candidate.role = role.to_string();
        candidate.assignment_start_time = start.to_string();
        candidate.assignment_end_time = end.to_string();

        let conflicts = find_conflicts(
            &activities,
            activity_id,
            ResourceKind::Personnel,
            personnel_id,
            &candidate,
        );
        if !conflicts.is_empty() && !force {
            rejected("conflict");
            return Err(EngineError::ScheduleConflict {
                titles: conflicts.iter().map(|a| a.title.clone()).collect(),
            });
        }
        if let Some(window) = activity.assignment_window(&candidate) {
            if !covers(&person.availability, &window) {
                rejected("unavailable");
                return Err(EngineError::Unavailable { kind: "staff member" });
            }
        }
        check_list(&current, "activity personnel assignments")?;

        let mut entries = current;
        entries.push(candidate);
        let patch = ActivityPatch {
            assigned_personnel: Some(to_personnel_payload(&entries)),
            ..ActivityPatch::default()
        };
        self.store.update_activity(activity_id, patch).await?;
        metrics::counter!(crate::observability::ASSIGNMENTS_TOTAL, "kind" => "personnel")
            .increment(1);
        info!(activity = %activity_id, person = %personnel_id, forced = force, "assigned personnel");
        Ok(())
    }

    pub async fn assign_asset_to_activity(
        &self,
        activity_id: &str,
        asset_id: &str,
        start: &str,
        end: &str,
        force: bool,
    ) -> Result<(), EngineError> {
        let (activities, assets) =
            tokio::try_join!(self.store.list_activities(None), self.store.list_assets())?;
        let activity = activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| not_found("activity", activity_id))?;
        let asset = assets
            .iter()
            .find(|a| a.id == asset_id)
            .ok_or_else(|| not_found("asset", asset_id))?;

        let current = normalize_entries(&activity.assigned_assets);
        let date = activity.activity_date.as_deref().unwrap_or_default();

        // The same vehicle may serve one activity several times a day, but
        // not in overlapping windows.
        if let Some(target) = TimeWindow::from_parts(date, start, end) {
            let overlapping = current.iter().filter(|e| e.id == asset_id).any(|e| {
                TimeWindow::from_parts(date, &e.assignment_start_time, &e.assignment_end_time)
                    .is_some_and(|w| w.overlaps(&target))
            });
            if overlapping {
                rejected("duplicate");
                return Err(EngineError::AlreadyAssigned { kind: "asset" });
            }
        }

        let mut candidate = Assignment::bare(asset_id);
        candidate.kind = asset.kind.clone();
        candidate.assignment_start_time = start.to_string();
        candidate.assignment_end_time = end.to_string();

        let conflicts =
            find_conflicts(&activities, activity_id, ResourceKind::Asset, asset_id, &candidate);
        if !conflicts.is_empty() && !force {
            rejected("conflict");
            return Err(EngineError::ScheduleConflict {
                titles: conflicts.iter().map(|a| a.title.clone()).collect(),
            });
        }
        if let Some(window) = activity.assignment_window(&candidate) {
            if !covers(&asset.availability, &window) {
                rejected("unavailable");
                return Err(EngineError::Unavailable { kind: "asset" });
            }
        }
        // Hard constraint: no operator coverage, no vehicle. A dateless
        // activity can never resolve coverage, so it can never take one.
        if driver_for_window(asset, date, start, end).is_none() {
            rejected("no_operator");
            return Err(EngineError::NoOperatorCoverage);
        }
        check_list(&current, "activity asset assignments")?;

        let mut entries = current;
        entries.push(candidate);
        let patch = ActivityPatch {
            assigned_assets: Some(to_asset_payload(&entries)),
            ..ActivityPatch::default()
        };
        self.store.update_activity(activity_id, patch).await?;
        metrics::counter!(crate::observability::ASSIGNMENTS_TOTAL, "kind" => "asset").increment(1);
        info!(activity = %activity_id, asset = %asset_id, forced = force, "assigned asset");

        // Mirror the covering operator onto the personnel list.
        self.sync_operators_for_asset(asset_id).await?;
        Ok(())
    }

    pub async fn unassign_personnel_from_activity(
        &self,
        activity_id: &str,
        personnel_id: &str,
    ) -> Result<(), EngineError> {
        let activities = self.store.list_activities(None).await?;
        let activity = activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| not_found("activity", activity_id))?;

        let entries = normalize_entries(&activity.assigned_personnel);
        let asset_entries = normalize_entries(&activity.assigned_assets);
        let date = non_empty(&activity.activity_date);
        let protected = entries.iter().any(|e| {
            e.id == personnel_id && e.auto_driver && {
                let for_asset: Vec<Assignment> = asset_entries
                    .iter()
                    .filter(|a| a.id == e.asset_id)
                    .cloned()
                    .collect();
                covered_by_any(e, &for_asset, date)
            }
        });
        if protected {
            rejected("derived");
            return Err(EngineError::ImmutableDerived);
        }

        let remaining: Vec<Assignment> =
            entries.into_iter().filter(|e| e.id != personnel_id).collect();
        let patch = ActivityPatch {
            assigned_personnel: Some(to_personnel_payload(&remaining)),
            ..ActivityPatch::default()
        };
        self.store.update_activity(activity_id, patch).await?;
        info!(activity = %activity_id, person = %personnel_id, "unassigned personnel");
        Ok(())
    }

    /// Removes every assignment of the asset and, in the same write, the
    /// derived operator entries those assignments were covering.
    pub async fn unassign_asset_from_activity(
        &self,
        activity_id: &str,
        asset_id: &str,
    ) -> Result<(), EngineError> {
        let activities = self.store.list_activities(None).await?;
        let activity = activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| not_found("activity", activity_id))?;

        let remaining_assets: Vec<Assignment> = normalize_entries(&activity.assigned_assets)
            .into_iter()
            .filter(|e| e.id != asset_id)
            .collect();
        let remaining_personnel: Vec<Assignment> = normalize_entries(&activity.assigned_personnel)
            .into_iter()
            .filter(|e| !(e.auto_driver && e.asset_id == asset_id))
            .collect();

        let patch = ActivityPatch {
            assigned_assets: Some(to_asset_payload(&remaining_assets)),
            assigned_personnel: Some(to_personnel_payload(&remaining_personnel)),
            ..ActivityPatch::default()
        };
        self.store.update_activity(activity_id, patch).await?;
        info!(activity = %activity_id, asset = %asset_id, "unassigned asset");
        Ok(())
    }

    // ── Operator rosters ─────────────────────────────────────────

    pub async fn assign_operator_to_asset(
        &self,
        asset_id: &str,
        personnel_id: &str,
        role: &str,
        date: &str,
        start: &str,
        end: &str,
    ) -> Result<(), EngineError> {
        if !is_asset_operator_role(role) {
            return Err(EngineError::InvalidRole(role.to_string()));
        }
        if TimeWindow::from_parts(date, start, end).is_none() {
            return Err(EngineError::InvalidWindow);
        }
        let (assets, personnel) =
            tokio::try_join!(self.store.list_assets(), self.store.list_personnel())?;
        let asset = assets
            .iter()
            .find(|a| a.id == asset_id)
            .ok_or_else(|| not_found("asset", asset_id))?;
        personnel
            .iter()
            .find(|p| p.id == personnel_id)
            .ok_or_else(|| not_found("personnel", personnel_id))?;

        let roster = normalize_entries(&asset.assigned_personnel);
        let operators: Vec<Assignment> = roster
            .iter()
            .filter(|e| is_asset_operator_role(&e.role))
            .cloned()
            .collect();
        if operators.iter().any(|e| e.id == personnel_id) {
            rejected("duplicate");
            return Err(EngineError::AlreadyAssigned { kind: "person" });
        }
        if roster_overlap(&operators, date, start, end) {
            rejected("roster_overlap");
            return Err(EngineError::RosterOverlap);
        }
        check_list(&roster, "operator roster")?;

        // Personnel record first, then the roster; the targeted sync reads
        // the roster, so it must land last.
        let person_patch = PersonnelPatch {
            assigned_to: Some(asset_id.to_string()),
            status: Some("assigned".into()),
            ..PersonnelPatch::default()
        };
        self.store.update_personnel(personnel_id, person_patch).await?;

        let mut entries = roster;
        entries.push(Assignment {
            id: personnel_id.to_string(),
            role: role.to_string(),
            assignment_date: date.to_string(),
            assignment_start_time: start.to_string(),
            assignment_end_time: end.to_string(),
            ..Assignment::default()
        });
        let asset_patch = AssetPatch {
            assigned_personnel: Some(to_operator_payload(&entries)),
            ..AssetPatch::default()
        };
        self.store.update_asset(asset_id, asset_patch).await?;
        metrics::counter!(crate::observability::ASSIGNMENTS_TOTAL, "kind" => "operator")
            .increment(1);
        info!(asset = %asset_id, person = %personnel_id, %date, "rostered operator");

        self.sync_operators_for_asset(asset_id).await?;
        Ok(())
    }

    pub async fn unassign_operator_from_asset(
        &self,
        asset_id: &str,
        personnel_id: &str,
    ) -> Result<(), EngineError> {
        let assets = self.store.list_assets().await?;
        let asset = assets
            .iter()
            .find(|a| a.id == asset_id)
            .ok_or_else(|| not_found("asset", asset_id))?;

        let remaining: Vec<Assignment> = normalize_entries(&asset.assigned_personnel)
            .into_iter()
            .filter(|e| e.id != personnel_id)
            .collect();
        let patch = AssetPatch {
            assigned_personnel: Some(to_operator_payload(&remaining)),
            ..AssetPatch::default()
        };
        self.store.update_asset(asset_id, patch).await?;
        info!(asset = %asset_id, person = %personnel_id, "removed operator from roster");

        self.sync_operators_for_asset(asset_id).await?;
        Ok(())
    }

    // ── Routes ───────────────────────────────────────────────────

    /// Sets the route fields on one assignment, addressed positionally in the
    /// normalized list (normalized and stored order agree).
    pub async fn update_assignment_route(
        &self,
        activity_id: &str,
        kind: ResourceKind,
        index: usize,
        from_location_id: &str,
        to_location_id: &str,
        stay_at_location: bool,
    ) -> Result<(), EngineError> {
        let activities = self.store.list_activities(None).await?;
        let activity = activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| not_found("activity", activity_id))?;

        let patch = match kind {
            ResourceKind::Personnel => {
                let mut entries = normalize_entries(&activity.assigned_personnel);
                let entry = entries
                    .get_mut(index)
                    .ok_or_else(|| not_found("assignment", &index.to_string()))?;
                entry.from_location_id = from_location_id.to_string();
                entry.to_location_id = to_location_id.to_string();
                entry.stay_at_location = stay_at_location;
                ActivityPatch {
                    assigned_personnel: Some(to_personnel_payload(&entries)),
                    ..ActivityPatch::default()
                }
            }
            ResourceKind::Asset => {
                let mut entries = normalize_entries(&activity.assigned_assets);
                let entry = entries
                    .get_mut(index)
                    .ok_or_else(|| not_found("assignment", &index.to_string()))?;
                entry.from_location_id = from_location_id.to_string();
                entry.to_location_id = to_location_id.to_string();
                entry.stay_at_location = stay_at_location;
                ActivityPatch {
                    assigned_assets: Some(to_asset_payload(&entries)),
                    ..ActivityPatch::default()
                }
            }
        };
        self.store.update_activity(activity_id, patch).await?;
        Ok(())
    }

    // ── Workflow promotion ───────────────────────────────────────

    /// Moves fully staffed Planning activities to Ready. Only ever moves
    /// forward, and only out of Planning: demotion and later columns are the
    /// organizer's call.
    pub async fn auto_promote_ready(&self, activities: &[Activity]) -> Result<usize, EngineError> {
        let eligible: Vec<String> = activities
            .iter()
            .filter(|a| a.column == columns::PLANNING && is_fully_assigned(a))
            .map(|a| a.id.clone())
            .collect();
        if eligible.is_empty() {
            return Ok(0);
        }
        let writes = eligible.into_iter().map(|id| async move {
            let patch =
                ActivityPatch { column: Some(columns::READY.into()), ..ActivityPatch::default() };
            match self.store.update_activity(&id, patch).await {
                Ok(_) => Ok::<usize, EngineError>(1),
                Err(StoreError::NotFound(..)) => Ok(0),
                Err(e) => Err(e.into()),
            }
        });
        let promoted: usize = try_join_all(writes).await?.into_iter().sum();
        metrics::counter!(crate::observability::PROMOTIONS_TOTAL).increment(promoted as u64);
        debug!(promoted, "promotion pass");
        Ok(promoted)
    }

    // ── Record CRUD ──────────────────────────────────────────────

    pub async fn create_event(&self, event: Event) -> Result<Event, EngineError> {
        check_name(&event.title, "event title")?;
        Ok(self.store.create_event(event).await?)
    }

    pub async fn update_event(&self, id: &str, patch: EventPatch) -> Result<Event, EngineError> {
        if let Some(title) = &patch.title {
            check_name(title, "event title")?;
        }
        Ok(self.store.update_event(id, patch).await?)
    }

    /// The store cascades: the event's activities go with it.
    pub async fn delete_event(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_event(id).await?)
    }

    pub async fn create_activity(&self, activity: Activity) -> Result<Activity, EngineError> {
        check_name(&activity.title, "activity title")?;
        check_list(&activity.support_personnel_required, "required personnel slots")?;
        check_list(&activity.assets_required, "required asset slots")?;
        check_list(&activity.assigned_personnel, "activity personnel assignments")?;
        check_list(&activity.assigned_assets, "activity asset assignments")?;
        Ok(self.store.create_activity(activity).await?)
    }

    pub async fn update_activity(
        &self,
        id: &str,
        patch: ActivityPatch,
    ) -> Result<Activity, EngineError> {
        if let Some(title) = &patch.title {
            check_name(title, "activity title")?;
        }
        if let Some(list) = &patch.support_personnel_required {
            check_list(list, "required personnel slots")?;
        }
        if let Some(list) = &patch.assets_required {
            check_list(list, "required asset slots")?;
        }
        if let Some(list) = &patch.assigned_personnel {
            check_list(list, "activity personnel assignments")?;
        }
        if let Some(list) = &patch.assigned_assets {
            check_list(list, "activity asset assignments")?;
        }
        Ok(self.store.update_activity(id, patch).await?)
    }

    pub async fn delete_activity(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_activity(id).await?)
    }

    pub async fn create_asset(&self, asset: Asset) -> Result<Asset, EngineError> {
        check_name(&asset.name, "asset name")?;
        check_list(&asset.availability, "asset availability windows")?;
        check_list(&asset.assigned_personnel, "operator roster")?;
        Ok(self.store.create_asset(asset).await?)
    }

    pub async fn update_asset(&self, id: &str, patch: AssetPatch) -> Result<Asset, EngineError> {
        if let Some(name) = &patch.name {
            check_name(name, "asset name")?;
        }
        if let Some(list) = &patch.availability {
            check_list(list, "asset availability windows")?;
        }
        if let Some(list) = &patch.assigned_personnel {
            check_list(list, "operator roster")?;
        }
        Ok(self.store.update_asset(id, patch).await?)
    }

    pub async fn delete_asset(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_asset(id).await?)
    }

    pub async fn create_personnel(&self, person: Personnel) -> Result<Personnel, EngineError> {
        check_name(&person.name, "personnel name")?;
        check_list(&person.availability, "personnel availability windows")?;
        Ok(self.store.create_personnel(person).await?)
    }

    pub async fn update_personnel(
        &self,
        id: &str,
        patch: PersonnelPatch,
    ) -> Result<Personnel, EngineError> {
        if let Some(name) = &patch.name {
            check_name(name, "personnel name")?;
        }
        if let Some(list) = &patch.availability {
            check_list(list, "personnel availability windows")?;
        }
        Ok(self.store.update_personnel(id, patch).await?)
    }

    pub async fn delete_personnel(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_personnel(id).await?)
    }

    pub async fn create_location(&self, location: Location) -> Result<Location, EngineError> {
        check_name(&location.name, "location name")?;
        Ok(self.store.create_location(location).await?)
    }

    pub async fn update_location(
        &self,
        id: &str,
        patch: LocationPatch,
    ) -> Result<Location, EngineError> {
        if let Some(name) = &patch.name {
            check_name(name, "location name")?;
        }
        Ok(self.store.update_location(id, patch).await?)
    }

    pub async fn delete_location(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.store.delete_location(id).await?)
    }
}
