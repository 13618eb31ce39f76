//! Canonicalization of stored list shapes. Every list the store hands back
//! may mix bare ids, legacy spellings, and full records; everything downstream
//! works on the [`Assignment`] form produced here, and every write goes back
//! out through the payload builders so stored shapes only ever get cleaner.

use crate::model::*;

/// Adapter from a stored record shape to the canonical assignment.
pub(crate) trait AssignmentSource {
    fn to_assignment(&self) -> Assignment;
}

impl AssignmentSource for PersonnelAssignment {
    fn to_assignment(&self) -> Assignment {
        Assignment {
            id: resolve_id(&self.personnel_id, &self.id),
            role: self.role.clone(),
            assignment_date: self.assignment_date.clone(),
            assignment_start_time: self.assignment_start_time.clone(),
            assignment_end_time: self.assignment_end_time.clone(),
            auto_driver: self.auto_driver,
            asset_id: self.asset_id.clone(),
            from_location_id: self.from_location_id.clone(),
            to_location_id: self.to_location_id.clone(),
            stay_at_location: self.stay_at_location,
            ..Assignment::default()
        }
    }
}

impl AssignmentSource for AssetAssignment {
    fn to_assignment(&self) -> Assignment {
        Assignment {
            id: resolve_id(&self.asset_id, &self.id),
            kind: self.kind.clone(),
            assignment_start_time: self.assignment_start_time.clone(),
            assignment_end_time: self.assignment_end_time.clone(),
            from_location_id: self.from_location_id.clone(),
            to_location_id: self.to_location_id.clone(),
            stay_at_location: self.stay_at_location,
            ..Assignment::default()
        }
    }
}

impl AssignmentSource for OperatorAssignment {
    fn to_assignment(&self) -> Assignment {
        Assignment {
            id: resolve_id(&self.personnel_id, &self.id),
            role: self.role.clone(),
            assignment_date: self.assignment_date.clone(),
            assignment_start_time: self.assignment_start_time.clone(),
            assignment_end_time: self.assignment_end_time.clone(),
            ..Assignment::default()
        }
    }
}

fn resolve_id(primary: &str, legacy: &str) -> String {
    if primary.is_empty() {
        legacy.to_string()
    } else {
        primary.to_string()
    }
}

/// Canonicalizes a stored entry list. Bare ids become assignments with every
/// other field defaulted; entries that resolve to no id at all are dropped.
pub fn normalize_entries<T: AssignmentSource>(list: &[Entry<T>]) -> Vec<Assignment> {
    list.iter()
        .map(|entry| match entry {
            Entry::Id(id) => Assignment::bare(id.clone()),
            Entry::Record(record) => record.to_assignment(),
        })
        .filter(|a| !a.id.is_empty())
        .collect()
}

// ── Payload builders ─────────────────────────────────────────────

pub fn to_personnel_payload(entries: &[Assignment]) -> Vec<PersonnelEntry> {
    entries
        .iter()
        .filter(|e| !e.id.is_empty())
        .map(|e| {
            Entry::Record(PersonnelAssignment {
                personnel_id: e.id.clone(),
                role: e.role.clone(),
                assignment_date: e.assignment_date.clone(),
                assignment_start_time: e.assignment_start_time.clone(),
                assignment_end_time: e.assignment_end_time.clone(),
                auto_driver: e.auto_driver,
                asset_id: e.asset_id.clone(),
                from_location_id: e.from_location_id.clone(),
                to_location_id: e.to_location_id.clone(),
                stay_at_location: e.stay_at_location,
                ..PersonnelAssignment::default()
            })
        })
        .collect()
}

pub fn to_asset_payload(entries: &[Assignment]) -> Vec<AssetEntry> {
    entries
        .iter()
        .filter(|e| !e.id.is_empty())
        .map(|e| {
            Entry::Record(AssetAssignment {
                asset_id: e.id.clone(),
                kind: e.kind.clone(),
                assignment_start_time: e.assignment_start_time.clone(),
                assignment_end_time: e.assignment_end_time.clone(),
                from_location_id: e.from_location_id.clone(),
                to_location_id: e.to_location_id.clone(),
                stay_at_location: e.stay_at_location,
                ..AssetAssignment::default()
            })
        })
        .collect()
}

pub fn to_operator_payload(entries: &[Assignment]) -> Vec<OperatorEntry> {
    entries
        .iter()
        .filter(|e| !e.id.is_empty())
        .map(|e| {
            Entry::Record(OperatorAssignment {
                personnel_id: e.id.clone(),
                role: e.role.clone(),
                assignment_date: e.assignment_date.clone(),
                assignment_start_time: e.assignment_start_time.clone(),
                assignment_end_time: e.assignment_end_time.clone(),
                ..OperatorAssignment::default()
            })
        })
        .collect()
}

// ── Required slots and availability ──────────────────────────────

/// Flattens the mixed required-slot shapes into role names. Numbers stringify;
/// anything else unresolvable drops.
pub fn normalize_required(list: &[RequiredSlot]) -> Vec<String> {
    list.iter()
        .filter_map(|slot| match slot {
            RequiredSlot::Name(name) => Some(name.clone()),
            RequiredSlot::Labeled(labeled) => Some(labeled.name.clone()),
            RequiredSlot::Other(value) => {
                if let Some(n) = value.as_i64() {
                    Some(n.to_string())
                } else {
                    value.as_f64().map(|n| n.to_string())
                }
            }
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Canonicalizes declared availability: the legacy single-`date` spelling
/// feeds both bounds, and windows missing any of the four parts drop.
pub fn normalize_availability(list: &[AvailabilityWindow]) -> Vec<AvailabilityWindow> {
    list.iter()
        .map(|w| AvailabilityWindow {
            label: w.label.clone(),
            start_date: if w.start_date.is_empty() { w.date.clone() } else { w.start_date.clone() },
            end_date: if w.end_date.is_empty() { w.date.clone() } else { w.end_date.clone() },
            date: String::new(),
            start_time: w.start_time.clone(),
            end_time: w.end_time.clone(),
        })
        .filter(|w| {
            !w.start_date.is_empty()
                && !w.end_date.is_empty()
                && !w.start_time.is_empty()
                && !w.end_time.is_empty()
        })
        .collect()
}
