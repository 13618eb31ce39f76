use serde::Deserialize;

use crate::model::*;

use super::normalize::normalize_entries;

/// Which assignment list a wire request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Personnel,
    Asset,
}

// ── Cross-activity conflict scan ─────────────────────────────────

/// Activities (other than the target) where `resource_id` is already booked in
/// a window overlapping the candidate's. The candidate window resolves against
/// the target activity; if neither resolves, nothing can conflict.
pub fn find_conflicts<'a>(
    activities: &'a [Activity],
    activity_id: &str,
    kind: ResourceKind,
    resource_id: &str,
    candidate: &Assignment,
) -> Vec<&'a Activity> {
    let Some(target) = activities.iter().find(|a| a.id == activity_id) else {
        return Vec::new();
    };
    let Some(window) = target.assignment_window(candidate) else {
        return Vec::new();
    };

    activities
        .iter()
        .filter(|a| a.id != activity_id)
        .filter(|a| {
            let entries = match kind {
                ResourceKind::Personnel => normalize_entries(&a.assigned_personnel),
                ResourceKind::Asset => normalize_entries(&a.assigned_assets),
            };
            entries
                .iter()
                .filter(|e| e.id == resource_id)
                .any(|e| a.assignment_window(e).is_some_and(|w| w.overlaps(&window)))
        })
        .collect()
}

/// Hard overlap check for operator rosters: an existing entry on the same
/// date whose window overlaps the candidate blocks the write. Entries on
/// other dates never collide.
pub fn roster_overlap(roster: &[Assignment], date: &str, start: &str, end: &str) -> bool {
    let Some(candidate) = TimeWindow::from_parts(date, start, end) else {
        return false;
    };
    roster
        .iter()
        .filter(|e| e.assignment_date == date)
        .any(|e| {
            TimeWindow::from_parts(date, &e.assignment_start_time, &e.assignment_end_time)
                .is_some_and(|w| w.overlaps(&candidate))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: &str, date: &str, start: &str, end: &str) -> Activity {
        Activity {
            id: id.into(),
            title: format!("activity {id}"),
            activity_date: Some(date.into()),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            ..Activity::default()
        }
    }

    #[test]
    fn overlapping_booking_on_another_activity_conflicts() {
        let mut a = activity("a1", "2026-06-08", "09:00", "11:00");
        let mut b = activity("a2", "2026-06-08", "10:00", "12:00");
        b.assigned_personnel = vec![Entry::Id("p1".into())];
        a.assigned_personnel = vec![];
        let activities = vec![a, b];

        let hits = find_conflicts(
            &activities,
            "a1",
            ResourceKind::Personnel,
            "p1",
            &Assignment::bare("p1"),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a2");
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let a = activity("a1", "2026-06-08", "09:00", "11:00");
        let mut b = activity("a2", "2026-06-08", "11:00", "13:00");
        b.assigned_personnel = vec![Entry::Id("p1".into())];
        let activities = vec![a, b];

        let hits = find_conflicts(
            &activities,
            "a1",
            ResourceKind::Personnel,
            "p1",
            &Assignment::bare("p1"),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn entry_time_overrides_decide_the_other_side() {
        let a = activity("a1", "2026-06-08", "09:00", "11:00");
        let mut b = activity("a2", "2026-06-08", "13:00", "17:00");
        // Booked 10:00-11:30 despite the activity running 13:00-17:00.
        b.assigned_personnel = vec![Entry::Record(PersonnelAssignment {
            personnel_id: "p1".into(),
            assignment_start_time: "10:00".into(),
            assignment_end_time: "11:30".into(),
            ..PersonnelAssignment::default()
        })];
        let activities = vec![a, b];

        let hits = find_conflicts(
            &activities,
            "a1",
            ResourceKind::Personnel,
            "p1",
            &Assignment::bare("p1"),
        );
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn candidate_override_narrows_the_window() {
        let a = activity("a1", "2026-06-08", "09:00", "17:00");
        let mut b = activity("a2", "2026-06-08", "15:00", "16:00");
        b.assigned_personnel = vec![Entry::Id("p1".into())];
        let activities = vec![a, b];

        let mut candidate = Assignment::bare("p1");
        candidate.assignment_start_time = "09:00".into();
        candidate.assignment_end_time = "10:00".into();
        let hits = find_conflicts(&activities, "a1", ResourceKind::Personnel, "p1", &candidate);
        assert!(hits.is_empty());
    }

    #[test]
    fn asset_kind_scans_the_asset_list() {
        let a = activity("a1", "2026-06-08", "09:00", "11:00");
        let mut b = activity("a2", "2026-06-08", "10:00", "12:00");
        b.assigned_assets = vec![Entry::Id("v1".into())];
        b.assigned_personnel = vec![Entry::Id("v1".into())]; // wrong list, ignored for assets
        let activities = vec![a, b.clone()];

        let hits =
            find_conflicts(&activities, "a1", ResourceKind::Asset, "v1", &Assignment::bare("v1"));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn dateless_target_never_conflicts() {
        let mut a = activity("a1", "2026-06-08", "09:00", "11:00");
        a.activity_date = None;
        let mut b = activity("a2", "2026-06-08", "09:00", "11:00");
        b.assigned_personnel = vec![Entry::Id("p1".into())];
        let activities = vec![a, b];

        let hits = find_conflicts(
            &activities,
            "a1",
            ResourceKind::Personnel,
            "p1",
            &Assignment::bare("p1"),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn roster_overlap_is_per_date() {
        let roster = vec![Assignment {
            id: "p1".into(),
            role: "Driver".into(),
            assignment_date: "2026-06-08".into(),
            assignment_start_time: "08:00".into(),
            assignment_end_time: "12:00".into(),
            ..Assignment::default()
        }];
        assert!(roster_overlap(&roster, "2026-06-08", "11:00", "13:00"));
        assert!(!roster_overlap(&roster, "2026-06-08", "12:00", "14:00"));
        // Same times on another date never collide.
        assert!(!roster_overlap(&roster, "2026-06-09", "08:00", "12:00"));
        assert!(!roster_overlap(&roster, "junk", "08:00", "12:00"));
    }
}
