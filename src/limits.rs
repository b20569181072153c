use crate::model::Minutes;

/// Resources in one catalog.
pub const MAX_RESOURCES: usize = 1_024;

/// Intervals held by one timetable (placement and repacking are O(n²)).
pub const MAX_INTERVALS: usize = 20_000;

/// Resource names, owner names and record ids.
pub const MAX_NAME_LEN: usize = 256;

/// One wire frame (a full inventory document fits in a single line).
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// 1970-01-01T00:00Z.
pub const MIN_VALID_MINUTES: Minutes = 0;

/// 9999-12-31T23:59Z.
pub const MAX_VALID_MINUTES: Minutes = 4_223_371_679;
