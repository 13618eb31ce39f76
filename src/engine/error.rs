use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    NotFound { kind: &'static str, id: String },
    /// The resource is already on the target list (person on an activity or a
    /// vehicle roster, asset overlapping its own earlier assignment).
    AlreadyAssigned { kind: &'static str },
    /// A new operator window overlaps an existing roster window on that date.
    RosterOverlap,
    /// The assignment window falls outside the resource's declared availability.
    Unavailable { kind: &'static str },
    /// No rostered operator covers the requested window.
    NoOperatorCoverage,
    /// Advisory double-booking; carries the conflicting activity titles so the
    /// caller can re-issue with force.
    ScheduleConflict { titles: Vec<String> },
    InvalidRole(String),
    /// The request needs a parseable date + start + end and didn't have one.
    InvalidWindow,
    /// Derived operator entries belong to reconciliation; remove the asset
    /// assignment or the roster entry instead.
    ImmutableDerived,
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::AlreadyAssigned { kind } => {
                write!(f, "this {kind} is already assigned during this time")
            }
            EngineError::RosterOverlap => {
                write!(f, "this person already has an operator window that overlaps this time")
            }
            EngineError::Unavailable { kind } => {
                write!(f, "this {kind} is not available during this time")
            }
            EngineError::NoOperatorCoverage => {
                write!(f, "this vehicle must have an operator assigned for this time window")
            }
            EngineError::ScheduleConflict { titles } => {
                write!(f, "schedule conflict with: {}", titles.join(", "))
            }
            EngineError::InvalidRole(role) => write!(f, "invalid operator role: {role}"),
            EngineError::InvalidWindow => {
                write!(f, "a valid date, start time and end time are required")
            }
            EngineError::ImmutableDerived => {
                write!(f, "this entry is managed automatically from the vehicle roster")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(kind, id) => EngineError::NotFound { kind, id },
            other => EngineError::Store(other),
        }
    }
}
