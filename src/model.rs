use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::{MAX_VALID_MINUTES, MIN_VALID_MINUTES};

/// Whole minutes since 1970-01-01T00:00Z, the only time type. The epoch is also
/// the earliest valid instant.
pub type Minutes = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for anything that did not come out of a `Span` already.
    pub fn try_new(start: Minutes, end: Minutes) -> Result<Self, EngineError> {
        if end <= start {
            return Err(EngineError::MalformedInput(format!(
                "interval end {end} is not after start {start}"
            )));
        }
        if start < MIN_VALID_MINUTES || end > MAX_VALID_MINUTES {
            return Err(EngineError::MalformedInput(format!(
                "interval [{start}, {end}) outside the valid time range"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One committed reservation on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub id: String,
    pub owner: String,
    pub span: Span,
}

impl Interval {
    pub fn new(id: impl Into<String>, owner: impl Into<String>, span: Span) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            span,
        }
    }

    /// Interval for a record that carries no id of its own.
    pub fn with_generated_id(owner: impl Into<String>, span: Span) -> Self {
        Self::new(Ulid::new().to_string(), owner, span)
    }
}

/// One line of the resource catalog. Catalog order is placement priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default = "default_reservable")]
    pub reservable: bool,
}

fn default_reservable() -> bool {
    true
}

impl CatalogEntry {
    pub fn reservable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reservable: true,
        }
    }

    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reservable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    /// Non-reservable resources keep their intervals but never take part in
    /// placement or repacking.
    pub reservable: bool,
    /// Sorted by `span.start`, pairwise non-overlapping.
    pub intervals: Vec<Interval>,
}

impl Resource {
    pub fn new(name: impl Into<String>, reservable: bool) -> Self {
        Self {
            name: name.into(),
            reservable,
            intervals: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Insert before the first interval starting at or after the new one.
    /// Overlap is not checked here; see `Timetable::insert`.
    pub fn insert(&mut self, interval: Interval) {
        let pos = self
            .intervals
            .iter()
            .position(|i| interval.span.start <= i.span.start)
            .unwrap_or(self.intervals.len());
        self.intervals.insert(pos, interval);
    }

    /// Remove the first interval with exactly these bounds. Absent is a no-op.
    pub fn remove(&mut self, span: &Span) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.span == *span)?;
        Some(self.intervals.remove(pos))
    }

    /// Adjacent interval to the one with exactly these bounds. With duplicate
    /// bounds the last match is used.
    pub fn neighbor(&self, span: &Span, direction: Direction) -> Option<&Interval> {
        let pos = self.intervals.iter().rposition(|i| i.span == *span)?;
        match direction {
            Direction::Previous => pos.checked_sub(1).and_then(|p| self.intervals.get(p)),
            Direction::Next => self.intervals.get(pos + 1),
        }
    }

    /// Intervals overlapping the query window.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        // Everything at index >= right_bound starts at or after query.end.
        let right_bound = self
            .intervals
            .partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }

    /// Idle minutes between consecutive intervals.
    pub fn total_gap(&self) -> Minutes {
        self.intervals
            .windows(2)
            .map(|w| (w[1].span.start - w[0].span.end).max(0))
            .sum()
    }
}
