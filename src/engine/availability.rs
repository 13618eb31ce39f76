use crate::model::*;

use super::normalize::normalize_availability;

// ── Availability projection ──────────────────────────────────────
//
// Declared availability is a list of date-ranged windows whose times repeat on
// every date in the range. Checks project the windows onto one date first and
// then do plain window math on that date.

/// Concrete windows a resource is available on `date`. Unparseable windows
/// drop; an empty result means the resource declared nothing for that date.
pub fn availability_windows(availability: &[AvailabilityWindow], date: &str) -> Vec<TimeWindow> {
    let Some(day) = parse_date(date) else {
        return Vec::new();
    };
    normalize_availability(availability)
        .iter()
        .filter(|w| {
            let (Some(start), Some(end)) = (parse_date(&w.start_date), parse_date(&w.end_date))
            else {
                return false;
            };
            start <= day && day <= end
        })
        .filter_map(|w| TimeWindow::from_parts(date, &w.start_time, &w.end_time))
        .collect()
}

/// Strict check used by mutators: the candidate window must lie fully inside
/// one declared window on its date. A resource with no declared windows on
/// that date fails.
pub fn covers(availability: &[AvailabilityWindow], candidate: &TimeWindow) -> bool {
    let date = candidate.start.date().format("%Y-%m-%d").to_string();
    availability_windows(availability, &date)
        .iter()
        .any(|w| w.contains(candidate))
}

/// Permissive display check: an activity without a resolvable window blocks
/// nothing, so the resource reads as available. With a window, same
/// containment rule as [`covers`].
pub fn is_resource_available(availability: &[AvailabilityWindow], activity: &Activity) -> bool {
    match activity.time_range() {
        Some(window) => covers(availability, &window),
        None => true,
    }
}
