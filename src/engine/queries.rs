use crate::model::*;

use super::normalize::normalize_entries;
use super::Snapshot;

// ── Personal itinerary ───────────────────────────────────────────

/// "Name, City, ST 12345" with whatever parts the record has.
pub fn format_location_label(location: &Location) -> String {
    let parts: Vec<&str> = [&location.name, &location.city, &location.state]
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect();
    let label = parts.join(", ");
    if location.zip.is_empty() {
        label
    } else if label.is_empty() {
        location.zip.clone()
    } else {
        format!("{label} {}", location.zip)
    }
}

fn location_label(locations: &[Location], id: &str) -> String {
    if id.is_empty() {
        return String::new();
    }
    locations
        .iter()
        .find(|l| l.id == id)
        .map(format_location_label)
        .unwrap_or_default()
}

/// Every booking of one person across all activities, resolved for display
/// and sorted by date then start time. Route fields missing on a derived
/// entry fall back to the asset assignment it mirrors (matched by asset and
/// exact window).
pub fn personal_schedule(snap: &Snapshot, personnel_id: &str) -> Vec<ScheduleEntry> {
    let mut rows = Vec::new();
    for activity in &snap.activities {
        let event_title = snap
            .events
            .iter()
            .find(|e| e.id == activity.event_id)
            .map(|e| e.title.clone())
            .unwrap_or_default();
        let asset_assignments = normalize_entries(&activity.assigned_assets);

        for entry in normalize_entries(&activity.assigned_personnel)
            .into_iter()
            .filter(|e| e.id == personnel_id)
        {
            let mut from = entry.from_location_id.clone();
            let mut to = entry.to_location_id.clone();
            let mut stay = entry.stay_at_location;
            if !entry.asset_id.is_empty() && (from.is_empty() || to.is_empty()) {
                let mirrored = asset_assignments.iter().find(|a| {
                    a.id == entry.asset_id
                        && a.assignment_start_time == entry.assignment_start_time
                        && a.assignment_end_time == entry.assignment_end_time
                });
                if let Some(a) = mirrored {
                    if from.is_empty() {
                        from = a.from_location_id.clone();
                    }
                    if to.is_empty() {
                        to = a.to_location_id.clone();
                    }
                    stay = stay || a.stay_at_location;
                }
            }

            let asset_name = snap
                .assets
                .iter()
                .find(|a| a.id == entry.asset_id)
                .map(|a| a.name.clone())
                .unwrap_or_default();

            let start = if entry.assignment_start_time.is_empty() {
                activity.start_time.clone().unwrap_or_default()
            } else {
                entry.assignment_start_time.clone()
            };
            let end = if entry.assignment_end_time.is_empty() {
                activity.end_time.clone().unwrap_or_default()
            } else {
                entry.assignment_end_time.clone()
            };

            rows.push(ScheduleEntry {
                activity_id: activity.id.clone(),
                activity_title: activity.title.clone(),
                event_title: event_title.clone(),
                date: activity.activity_date.clone().unwrap_or_default(),
                start_time: start,
                end_time: end,
                role: entry.role.clone(),
                auto_driver: entry.auto_driver,
                asset_name,
                from_location: location_label(&snap.locations, &from),
                to_location: location_label(&snap.locations, &to),
                stay_at_location: stay,
            });
        }
    }
    rows.sort_by(|a, b| (a.date.as_str(), a.start_time.as_str()).cmp(&(b.date.as_str(), b.start_time.as_str())));
    rows
}
