//! Boundary caps. Everything user-supplied is bounded before it reaches the
//! store; the engine rejects with `LimitExceeded` rather than truncating.

/// Longest accepted title/name for any record.
pub const MAX_NAME_LEN: usize = 256;

/// Most entries in any stored list (assignments, rosters, availability,
/// required slots).
pub const MAX_LIST_ENTRIES: usize = 512;

/// Longest accepted request line on the wire, in bytes.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

/// Default concurrent-connection cap when MUSTER_MAX_CONNECTIONS is unset.
pub const MAX_CONNECTIONS_DEFAULT: usize = 256;
