use futures::future::try_join_all;
use tracing::debug;

use crate::model::*;
use crate::store::{ActivityPatch, StoreError};

use super::normalize::{normalize_entries, to_personnel_payload};
use super::{Engine, EngineError, Snapshot};

// ── Operator coverage ────────────────────────────────────────────
//
// Vehicles carry their own roster of who may operate them and when. An asset
// assignment on an activity is only valid while some roster window covers it,
// and the covering operator is mirrored onto the activity's personnel list as
// a derived (`auto_driver`) entry. Those derived entries are owned entirely
// by the reconcile passes below; nothing else writes them.

/// First rostered operator whose window on `date` overlaps the requested
/// window. Roster order decides ties. `None` when the request itself does not
/// parse: a vehicle can never be booked into an unresolvable window.
pub fn driver_for_window(asset: &Asset, date: &str, start: &str, end: &str) -> Option<Assignment> {
    let target = TimeWindow::from_parts(date, start, end)?;
    normalize_entries(&asset.assigned_personnel)
        .into_iter()
        .filter(|e| is_asset_operator_role(&e.role) && e.assignment_date == date)
        .find(|e| {
            TimeWindow::from_parts(date, &e.assignment_start_time, &e.assignment_end_time)
                .is_some_and(|w| w.overlaps(&target))
        })
}

/// Derived personnel entry mirroring one asset assignment's covering operator.
/// Times come from the asset assignment, not the roster window.
pub(crate) fn derived_operator_entry(
    driver: &Assignment,
    date: &str,
    start: &str,
    end: &str,
    asset_id: &str,
) -> Assignment {
    Assignment {
        id: driver.id.clone(),
        role: if driver.role.is_empty() { roles::DRIVER.into() } else { driver.role.clone() },
        assignment_date: date.into(),
        assignment_start_time: start.into(),
        assignment_end_time: end.into(),
        auto_driver: true,
        asset_id: asset_id.into(),
        ..Assignment::default()
    }
}

fn find_asset<'a>(assets: &'a [Asset], id: &str) -> Option<&'a Asset> {
    assets.iter().find(|a| a.id == id)
}

impl Engine {
    /// Full reconcile: rebuilds every activity's personnel list as all manual
    /// entries plus freshly derived operator entries, writing only activities
    /// whose stored payload would change. Returns the number of writes, so a
    /// clean second pass reports zero.
    pub async fn sync_all_operators(&self, snap: &Snapshot) -> Result<usize, EngineError> {
        let mut updates = Vec::new();
        for activity in &snap.activities {
            let current = normalize_entries(&activity.assigned_personnel);
            let mut rebuilt: Vec<Assignment> =
                current.iter().filter(|e| !e.auto_driver).cloned().collect();

            if let Some(date) = non_empty(&activity.activity_date) {
                for assignment in normalize_entries(&activity.assigned_assets) {
                    if assignment.assignment_start_time.is_empty()
                        || assignment.assignment_end_time.is_empty()
                    {
                        continue;
                    }
                    let Some(asset) = find_asset(&snap.assets, &assignment.id) else {
                        continue;
                    };
                    if let Some(driver) = driver_for_window(
                        asset,
                        date,
                        &assignment.assignment_start_time,
                        &assignment.assignment_end_time,
                    ) {
                        rebuilt.push(derived_operator_entry(
                            &driver,
                            date,
                            &assignment.assignment_start_time,
                            &assignment.assignment_end_time,
                            &assignment.id,
                        ));
                    }
                }
            }

            let payload = to_personnel_payload(&rebuilt);
            if payload != to_personnel_payload(&current) {
                updates.push((activity.id.clone(), payload));
            }
        }

        if updates.is_empty() {
            return Ok(0);
        }
        let writes = updates.into_iter().map(|(id, payload)| async move {
            let patch = ActivityPatch { assigned_personnel: Some(payload), ..ActivityPatch::default() };
            match self.store.update_activity(&id, patch).await {
                Ok(_) => Ok::<usize, EngineError>(1),
                // Deleted out from under the pass; nothing left to reconcile.
                Err(StoreError::NotFound(..)) => {
                    debug!(activity = %id, "reconcile skipped missing activity");
                    Ok(0)
                }
                Err(e) => Err(e.into()),
            }
        });
        let written: usize = try_join_all(writes).await?.into_iter().sum();
        metrics::counter!(crate::observability::RECONCILE_WRITES_TOTAL).increment(written as u64);
        debug!(written, "operator reconcile pass");
        Ok(written)
    }

    /// Targeted reconcile after a write that touched one asset: drops derived
    /// entries for that asset that its current assignments no longer cover,
    /// re-derives from the roster, and leaves every other entry alone.
    pub async fn sync_operators_for_asset(&self, asset_id: &str) -> Result<usize, EngineError> {
        let (assets, activities) =
            tokio::try_join!(self.store.list_assets(), self.store.list_activities(None))?;
        let Some(asset) = find_asset(&assets, asset_id) else {
            return Ok(0);
        };

        let mut written = 0;
        for activity in &activities {
            let assignments: Vec<Assignment> = normalize_entries(&activity.assigned_assets)
                .into_iter()
                .filter(|e| e.id == asset_id)
                .collect();
            if assignments.is_empty() {
                continue;
            }
            let date = non_empty(&activity.activity_date);

            let current = normalize_entries(&activity.assigned_personnel);
            let mut rebuilt: Vec<Assignment> = current
                .iter()
                .filter(|e| {
                    !(e.auto_driver
                        && e.asset_id == asset_id
                        && covered_by_any(e, &assignments, date))
                })
                .cloned()
                .collect();

            if let Some(date) = date {
                for assignment in &assignments {
                    if let Some(driver) = driver_for_window(
                        asset,
                        date,
                        &assignment.assignment_start_time,
                        &assignment.assignment_end_time,
                    ) {
                        rebuilt.push(derived_operator_entry(
                            &driver,
                            date,
                            &assignment.assignment_start_time,
                            &assignment.assignment_end_time,
                            asset_id,
                        ));
                    }
                }
            }

            let payload = to_personnel_payload(&rebuilt);
            if payload == to_personnel_payload(&current) {
                continue;
            }
            let patch = ActivityPatch { assigned_personnel: Some(payload), ..ActivityPatch::default() };
            self.store.update_activity(&activity.id, patch).await?;
            written += 1;
        }
        if written > 0 {
            metrics::counter!(crate::observability::RECONCILE_WRITES_TOTAL)
                .increment(written as u64);
        }
        Ok(written)
    }
}

/// Whether any of the given asset assignments' windows overlap this derived
/// entry's window on `date`. Unresolvable windows cover nothing.
pub(super) fn covered_by_any(
    entry: &Assignment,
    assignments: &[Assignment],
    date: Option<&str>,
) -> bool {
    let Some(date) = date else {
        return false;
    };
    let Some(window) =
        TimeWindow::from_parts(date, &entry.assignment_start_time, &entry.assignment_end_time)
    else {
        return false;
    };
    assignments.iter().any(|a| {
        TimeWindow::from_parts(date, &a.assignment_start_time, &a.assignment_end_time)
            .is_some_and(|w| w.overlaps(&window))
    })
}

// ── Display hints ────────────────────────────────────────────────

/// Whether some roster window covers the activity's own window. An activity
/// with no resolvable window constrains nothing.
pub fn asset_has_driver_for_activity(asset: &Asset, activity: &Activity) -> bool {
    let Some(window) = activity.time_range() else {
        return true;
    };
    let date = non_empty(&activity.activity_date).unwrap_or_default();
    normalize_entries(&asset.assigned_personnel)
        .iter()
        .filter(|e| is_asset_operator_role(&e.role) && e.assignment_date == date)
        .any(|e| {
            TimeWindow::from_parts(date, &e.assignment_start_time, &e.assignment_end_time)
                .is_some_and(|w| w.overlaps(&window))
        })
}

/// Whether the roster lists any operator at all for `date`.
pub fn asset_has_driver_on_date(asset: &Asset, date: &str) -> bool {
    !date.is_empty()
        && normalize_entries(&asset.assigned_personnel)
            .iter()
            .any(|e| is_asset_operator_role(&e.role) && e.assignment_date == date)
}

/// Whether this person is rostered on any vehicle over the activity's window.
pub fn is_driver_assigned_to_vehicle(
    assets: &[Asset],
    personnel_id: &str,
    activity: &Activity,
) -> bool {
    let Some(window) = activity.time_range() else {
        return false;
    };
    let date = non_empty(&activity.activity_date).unwrap_or_default();
    assets.iter().any(|asset| {
        normalize_entries(&asset.assigned_personnel).iter().any(|e| {
            e.id == personnel_id
                && is_asset_operator_role(&e.role)
                && e.assignment_date == date
                && TimeWindow::from_parts(date, &e.assignment_start_time, &e.assignment_end_time)
                    .is_some_and(|w| w.overlaps(&window))
        })
    })
}
