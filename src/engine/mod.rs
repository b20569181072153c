mod defrag;
mod error;
mod placement;
#[cfg(test)]
mod tests;

pub use defrag::{defragment, defragment_with_leftovers};
pub use error::EngineError;
pub use placement::{find_first_feasible, find_minimal_gap, place_request};

use std::collections::HashMap;

use serde_json::Value;

use crate::limits::*;
use crate::model::*;

/// A fixed catalog of resources and the reservations they hold.
///
/// Built fresh for every operation. Resource order is catalog order, which is
/// also the priority order for placement and repacking.
#[derive(Debug, Clone, PartialEq)]
pub struct Timetable {
    pub(super) resources: Vec<Resource>,
    /// Name → position in `resources`.
    index: HashMap<String, usize>,
    /// Opaque upstream document this timetable was loaded from.
    pub(super) external: Option<Value>,
}

impl Timetable {
    pub fn new(catalog: &[CatalogEntry]) -> Result<Self, EngineError> {
        if catalog.len() > MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        let mut resources = Vec::with_capacity(catalog.len());
        let mut index = HashMap::with_capacity(catalog.len());
        for entry in catalog {
            if entry.name.is_empty() {
                return Err(EngineError::MalformedInput("empty resource name".into()));
            }
            if entry.name.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("resource name too long"));
            }
            if index.insert(entry.name.clone(), resources.len()).is_some() {
                return Err(EngineError::DuplicateResource(entry.name.clone()));
            }
            resources.push(Resource::new(entry.name.clone(), entry.reservable));
        }
        Ok(Self {
            resources,
            index,
            external: None,
        })
    }

    /// Same catalog, no reservations.
    pub(super) fn empty_like(&self) -> Self {
        Self {
            resources: self
                .resources
                .iter()
                .map(|r| Resource::new(r.name.clone(), r.reservable))
                .collect(),
            index: self.index.clone(),
            external: None,
        }
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&slot| &self.resources[slot])
    }

    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.resources
            .iter()
            .map(|r| CatalogEntry {
                name: r.name.clone(),
                reservable: r.reservable,
            })
            .collect()
    }

    pub fn external(&self) -> Option<&Value> {
        self.external.as_ref()
    }

    pub fn set_external(&mut self, payload: Value) {
        self.external = Some(payload);
    }

    pub fn interval_count(&self) -> usize {
        self.resources.iter().map(Resource::len).sum()
    }

    /// Idle minutes across reservable resources.
    pub fn total_gap(&self) -> Minutes {
        self.resources
            .iter()
            .filter(|r| r.reservable)
            .map(Resource::total_gap)
            .sum()
    }

    /// Every held interval with the name of the resource holding it, catalog order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Interval)> {
        self.resources
            .iter()
            .flat_map(|r| r.intervals.iter().map(move |i| (r.name.as_str(), i)))
    }

    /// Checked insert: the resource must exist and the interval must fall into a gap.
    pub fn insert(&mut self, resource: &str, interval: Interval) -> Result<(), EngineError> {
        if interval.id.len() > MAX_NAME_LEN || interval.owner.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("reservation id or owner too long"));
        }
        if self.interval_count() >= MAX_INTERVALS {
            return Err(EngineError::LimitExceeded("too many reservations"));
        }
        let slot = *self
            .index
            .get(resource)
            .ok_or_else(|| EngineError::UnknownResource(resource.to_string()))?;
        let rs = &mut self.resources[slot];
        if rs.overlapping(&interval.span).next().is_some() {
            return Err(EngineError::Conflict {
                resource: resource.to_string(),
                span: interval.span,
            });
        }
        tracing::trace!(resource, id = %interval.id, "insert [{}, {})", interval.span.start, interval.span.end);
        rs.insert(interval);
        Ok(())
    }

    /// Absent resource or interval is a no-op.
    pub fn remove(&mut self, resource: &str, span: &Span) -> Option<Interval> {
        let slot = *self.index.get(resource)?;
        self.resources[slot].remove(span)
    }

    // ── Cross-resource queries used by repacking ─────────────

    /// `(slot, position)` of the earliest-starting interval on any reservable
    /// resource. Ties go to the earlier slot.
    pub(super) fn earliest_reservable(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, Minutes)> = None;
        for (slot, rs) in self.resources.iter().enumerate() {
            if !rs.reservable {
                continue;
            }
            if let Some(first) = rs.intervals.first()
                && best.is_none_or(|(_, start)| first.span.start < start)
            {
                best = Some((slot, first.span.start));
            }
        }
        best.map(|(slot, _)| (slot, 0))
    }

    /// `(slot, position)` of the reservable interval starting closest to, but
    /// not before, `after`. Ties go to the earlier slot.
    pub(super) fn closest_follower(&self, after: Minutes) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, Minutes)> = None;
        for (slot, rs) in self.resources.iter().enumerate() {
            if !rs.reservable {
                continue;
            }
            // Sorted, so the first qualifying interval is this resource's closest.
            let pos = rs.intervals.partition_point(|i| i.span.start < after);
            if let Some(candidate) = rs.intervals.get(pos) {
                let gap = candidate.span.start - after;
                if best.is_none_or(|(_, _, g)| gap < g) {
                    best = Some((slot, pos, gap));
                }
            }
        }
        best.map(|(slot, pos, _)| (slot, pos))
    }

    /// Move one interval out of the timetable.
    pub(super) fn take(&mut self, slot: usize, pos: usize) -> Interval {
        self.resources[slot].intervals.remove(pos)
    }

    /// Move every interval of one resource out of the timetable, order kept.
    pub(super) fn take_all(&mut self, slot: usize) -> Vec<Interval> {
        std::mem::take(&mut self.resources[slot].intervals)
    }
}
