use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Workflow columns for activities, in board order.
pub mod columns {
    pub const PLANNING: &str = "Planning";
    pub const READY: &str = "Ready";
    pub const IN_PROGRESS: &str = "In Progress";
    pub const COMPLETED: &str = "Completed";
    pub const ALL: [&str; 4] = [PLANNING, READY, IN_PROGRESS, COMPLETED];
}

/// Canonical role names offered by the roster UI.
pub mod roles {
    pub const DRIVER: &str = "Driver";
    pub const ORIENTATION_PILOT: &str = "Orientation Pilot";
    pub const OTHER: &str = "Other";
}

/// Roles that put a person behind the controls of a vehicle. These entries are
/// transport crew, not support staff, and never count toward personnel needs.
pub fn is_vehicle_operator_role(role: &str) -> bool {
    let r = role.trim();
    r.eq_ignore_ascii_case(roles::DRIVER) || r.eq_ignore_ascii_case(roles::ORIENTATION_PILOT)
}

/// Roles accepted on an asset's operator roster.
pub fn is_asset_operator_role(role: &str) -> bool {
    is_vehicle_operator_role(role) || role.trim().eq_ignore_ascii_case(roles::OTHER)
}

/// Treats a missing field and an empty string the same way.
pub fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn pick<'a>(override_time: &'a str, fallback: &'a Option<String>) -> Option<&'a str> {
    if override_time.is_empty() {
        non_empty(fallback)
    } else {
        Some(override_time)
    }
}

// ── Time-window model ────────────────────────────────────────────

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Half-open window `[start, end)` on the naive calendar. Touching endpoints
/// never conflict, and a window always compares on both date and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Builds a same-day window from wire strings. Any unparseable or empty
    /// part leaves the window undefined, which call sites treat as
    /// non-blocking rather than as a guaranteed miss.
    pub fn from_parts(date: &str, start: &str, end: &str) -> Option<Self> {
        let day = parse_date(date)?;
        Some(Self {
            start: day.and_time(parse_time(start)?),
            end: day.and_time(parse_time(end)?),
        })
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `other` lies fully inside `self`. Equal bounds pass.
    pub fn contains(&self, other: &TimeWindow) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

// ── Stored records ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub personnel_needed: u32,
    pub assets_needed: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub location_id: Option<String>,
    pub activity_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Workflow column, one of [`columns::ALL`].
    pub column: String,
    pub support_personnel_required: Vec<RequiredSlot>,
    pub assets_required: Vec<RequiredSlot>,
    pub assigned_personnel: Vec<PersonnelEntry>,
    pub assigned_assets: Vec<AssetEntry>,
    pub created_at: String,
}

impl Activity {
    /// The activity's own window: its date plus its default start/end times.
    pub fn time_range(&self) -> Option<TimeWindow> {
        TimeWindow::from_parts(
            non_empty(&self.activity_date)?,
            non_empty(&self.start_time)?,
            non_empty(&self.end_time)?,
        )
    }

    /// The effective window for one assignment: per-entry time overrides fall
    /// back to the activity defaults, and the date always comes from the
    /// activity itself.
    pub fn assignment_window(&self, entry: &Assignment) -> Option<TimeWindow> {
        let date = non_empty(&self.activity_date)?;
        let start = pick(&entry.assignment_start_time, &self.start_time)?;
        let end = pick(&entry.assignment_end_time, &self.end_time)?;
        TimeWindow::from_parts(date, start, end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    pub availability: Vec<AvailabilityWindow>,
    /// Operator roster: who may run this asset, and when.
    pub assigned_personnel: Vec<OperatorEntry>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personnel {
    pub id: String,
    pub name: String,
    pub cap_id: String,
    pub rank: String,
    pub specialties: String,
    pub availability: Vec<AvailabilityWindow>,
    pub status: String,
    pub assigned_to: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub lat: String,
    pub lng: String,
    pub created_at: String,
}

/// One declared availability window. The date bounds are inclusive and the
/// times repeat on every date in the range. A legacy `date` spelling is
/// accepted on ingress (it feeds both bounds) and never written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityWindow {
    pub label: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// One required-role slot. Stored data mixes plain strings with labeled
/// records, so the shape is only pinned down by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiredSlot {
    Name(String),
    Labeled(LabeledSlot),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabeledSlot {
    pub name: String,
}

// ── Assignment entries ───────────────────────────────────────────

/// A stored assignment-list element: either a bare id (oldest data) or a
/// structured record. Nothing outside the normalizer branches on this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry<T> {
    Id(String),
    Record(T),
}

pub type PersonnelEntry = Entry<PersonnelAssignment>;
pub type AssetEntry = Entry<AssetAssignment>;
pub type OperatorEntry = Entry<OperatorAssignment>;

/// Personnel assignment as stored on an activity. The `id` field is a legacy
/// spelling of `personnel_id`, accepted on ingress and never re-emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonnelAssignment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub personnel_id: String,
    pub role: String,
    pub assignment_date: String,
    pub assignment_start_time: String,
    pub assignment_end_time: String,
    pub auto_driver: bool,
    pub asset_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub stay_at_location: bool,
}

/// Asset assignment as stored on an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetAssignment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub asset_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub assignment_start_time: String,
    pub assignment_end_time: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub stay_at_location: bool,
}

/// Operator-roster entry as stored on an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorAssignment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub personnel_id: String,
    pub role: String,
    pub assignment_date: String,
    pub assignment_start_time: String,
    pub assignment_end_time: String,
}

/// Canonical assignment record. The normalizer maps every stored entry shape
/// into this; downstream code never sees raw entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub role: String,
    /// The wire `type` field (asset category on asset entries).
    pub kind: String,
    pub assignment_date: String,
    pub assignment_start_time: String,
    pub assignment_end_time: String,
    pub auto_driver: bool,
    pub asset_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub stay_at_location: bool,
}

impl Assignment {
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventTotals {
    pub required_personnel: u32,
    pub assigned_personnel: u32,
    pub required_assets: u32,
    pub assigned_assets: u32,
}

/// One row of a person's itinerary, fully resolved for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub activity_id: String,
    pub activity_title: String,
    pub event_title: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub role: String,
    pub auto_driver: bool,
    pub asset_name: String,
    pub from_location: String,
    pub to_location: String,
    pub stay_at_location: bool,
}
