use crate::model::*;

use super::normalize::{normalize_entries, normalize_required};

// ── Staffing math ────────────────────────────────────────────────

pub fn required_count(list: &[RequiredSlot]) -> usize {
    normalize_required(list).len()
}

/// Support-staff headcount. Transport crew never counts: derived operator
/// entries and manually added vehicle-operator roles are both excluded.
pub fn assigned_personnel_count(activity: &Activity) -> usize {
    normalize_entries(&activity.assigned_personnel)
        .iter()
        .filter(|e| !e.auto_driver && !is_vehicle_operator_role(&e.role))
        .count()
}

pub fn assigned_asset_count(activity: &Activity) -> usize {
    normalize_entries(&activity.assigned_assets).len()
}

/// An activity with no requirements at all is never "fully assigned"; each
/// nonzero requirement must be met on its own.
pub fn is_fully_assigned(activity: &Activity) -> bool {
    let required_personnel = required_count(&activity.support_personnel_required);
    let required_assets = required_count(&activity.assets_required);
    if required_personnel == 0 && required_assets == 0 {
        return false;
    }
    let personnel_met =
        required_personnel == 0 || assigned_personnel_count(activity) >= required_personnel;
    let assets_met = required_assets == 0 || assigned_asset_count(activity) >= required_assets;
    personnel_met && assets_met
}

/// Aggregate staffing counters over one event's activities.
pub fn event_activity_totals(event_id: &str, activities: &[Activity]) -> EventTotals {
    let mut totals = EventTotals::default();
    for activity in activities.iter().filter(|a| a.event_id == event_id) {
        totals.required_personnel += required_count(&activity.support_personnel_required) as u32;
        totals.assigned_personnel += assigned_personnel_count(activity) as u32;
        totals.required_assets += required_count(&activity.assets_required) as u32;
        totals.assigned_assets += assigned_asset_count(activity) as u32;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staffed_activity() -> Activity {
        Activity {
            support_personnel_required: vec![
                RequiredSlot::Name("Medic".into()),
                RequiredSlot::Name("Safety Officer".into()),
            ],
            assets_required: vec![RequiredSlot::Name("Van".into())],
            assigned_personnel: vec![
                Entry::Id("p1".into()),
                Entry::Record(PersonnelAssignment {
                    personnel_id: "p2".into(),
                    role: "Medic".into(),
                    ..PersonnelAssignment::default()
                }),
            ],
            assigned_assets: vec![Entry::Id("v1".into())],
            ..Activity::default()
        }
    }

    #[test]
    fn transport_crew_never_counts_as_support() {
        let mut activity = staffed_activity();
        activity.assigned_personnel.push(Entry::Record(PersonnelAssignment {
            personnel_id: "p3".into(),
            role: "Driver".into(),
            auto_driver: true,
            ..PersonnelAssignment::default()
        }));
        activity.assigned_personnel.push(Entry::Record(PersonnelAssignment {
            personnel_id: "p4".into(),
            role: "Orientation Pilot".into(), // manual, still transport
            ..PersonnelAssignment::default()
        }));
        assert_eq!(assigned_personnel_count(&activity), 2);
    }

    #[test]
    fn fully_assigned_needs_each_requirement_met() {
        let activity = staffed_activity();
        assert!(is_fully_assigned(&activity));

        let mut short = staffed_activity();
        short.assigned_personnel.pop();
        assert!(!is_fully_assigned(&short));

        let mut no_van = staffed_activity();
        no_van.assigned_assets.clear();
        assert!(!is_fully_assigned(&no_van));
    }

    #[test]
    fn zero_requirements_is_never_fully_assigned() {
        let mut activity = staffed_activity();
        activity.support_personnel_required.clear();
        activity.assets_required.clear();
        assert!(!is_fully_assigned(&activity));
    }

    #[test]
    fn one_sided_requirements_ignore_the_other_side() {
        let mut activity = staffed_activity();
        activity.assets_required.clear();
        activity.assigned_assets.clear();
        assert!(is_fully_assigned(&activity));
    }

    #[test]
    fn totals_sum_over_the_event_only() {
        let mut a = staffed_activity();
        a.event_id = "ev1".into();
        let mut b = staffed_activity();
        b.event_id = "ev1".into();
        b.assigned_assets.clear();
        let mut other = staffed_activity();
        other.event_id = "ev2".into();

        let totals = event_activity_totals("ev1", &[a, b, other]);
        assert_eq!(
            totals,
            EventTotals {
                required_personnel: 4,
                assigned_personnel: 4,
                required_assets: 2,
                assigned_assets: 1,
            }
        );
    }
}
