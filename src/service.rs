use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{EngineError, Timetable, defragment_with_leftovers, place_request};
use crate::model::*;
use crate::snapshot::{ReservationRecord, derive_catalog, parse_span};
use crate::upstream;

/// Result of placing one pending event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    /// `None` when no reservable spot could take the request.
    pub resource: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveOutcome {
    pub document: Value,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOutcome {
    pub document: Value,
    pub gap_before: Minutes,
    pub gap_after: Minutes,
    /// Ids of events no chain absorbed; their subjects are left as they were.
    pub unassigned: Vec<String>,
}

/// A bare placement request in the flat snapshot shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub id: Option<String>,
    pub start: String,
    pub end: String,
}

/// One request's worth of reservation logic.
///
/// Built fresh for every request from the catalog in force; holds no state
/// beyond it.
pub struct ReservationService {
    catalog: Vec<CatalogEntry>,
}

impl ReservationService {
    pub fn new(catalog: Vec<CatalogEntry>) -> Self {
        Self { catalog }
    }

    /// Flat snapshots without a configured catalog use the resources they name.
    fn snapshot_timetable(&self, reservations: Vec<ReservationRecord>) -> Result<Timetable, EngineError> {
        if self.catalog.is_empty() {
            let catalog = derive_catalog(&reservations);
            Timetable::construct(&catalog, reservations)
        } else {
            Timetable::construct(&self.catalog, reservations)
        }
    }

    /// Give every pending event in the document a spot, in document order.
    /// Each placement is inserted before the next one is decided.
    pub fn reserve(&self, document: Value) -> Result<ReserveOutcome, EngineError> {
        let (mut timetable, pending) = upstream::load(&self.catalog, document)?;
        let mut placements = Vec::with_capacity(pending.len());

        for request in pending {
            let chosen = place_request(&timetable, &request.span).map(str::to_owned);
            record_placement(chosen.is_some());
            let id = request.id.clone();
            if let Some(resource) = &chosen {
                timetable.insert(resource, request.into_interval())?;
            }
            debug!(id = %id, resource = ?chosen, "pending event placed");
            placements.push(Placement { id, resource: chosen });
        }

        let document = upstream::write_back(&timetable)?;
        Ok(ReserveOutcome {
            document,
            placements,
        })
    }

    /// Repack the document's events to minimize idle time per spot.
    pub fn optimize(&self, document: Value) -> Result<OptimizeOutcome, EngineError> {
        let (timetable, pending) = upstream::load(&self.catalog, document)?;
        let gap_before = timetable.total_gap();
        let (packed, leftovers) = defragment_with_leftovers(timetable);
        let gap_after = packed.total_gap();
        metrics::histogram!(crate::observability::DEFRAG_GAP_RECLAIMED_MINUTES)
            .record((gap_before - gap_after) as f64);

        info!(
            gap_before,
            gap_after,
            pending = pending.len(),
            unassigned = leftovers.len(),
            "timetable optimized"
        );
        Ok(OptimizeOutcome {
            document: upstream::write_back(&packed)?,
            gap_before,
            gap_after,
            unassigned: leftovers.into_iter().map(|(_, i)| i.id).collect(),
        })
    }

    /// Place one request against a flat snapshot. Returns the chosen resource
    /// and the snapshot with the request inserted.
    pub fn place(
        &self,
        reservations: Vec<ReservationRecord>,
        request: PlacementRequest,
    ) -> Result<(Option<String>, Vec<ReservationRecord>), EngineError> {
        let mut timetable = self.snapshot_timetable(reservations)?;
        let span = parse_span(&request.start, &request.end)?;
        let chosen = place_request(&timetable, &span).map(str::to_owned);
        record_placement(chosen.is_some());
        if let Some(resource) = &chosen {
            let interval = match request.id {
                Some(id) => Interval::new(id, request.owner, span),
                None => Interval::with_generated_id(request.owner, span),
            };
            timetable.insert(resource, interval)?;
        }
        Ok((chosen, timetable.serialize()))
    }

    /// Defragment a flat snapshot.
    pub fn defragment(
        &self,
        reservations: Vec<ReservationRecord>,
    ) -> Result<Vec<ReservationRecord>, EngineError> {
        let timetable = self.snapshot_timetable(reservations)?;
        let (packed, leftovers) = defragment_with_leftovers(timetable);
        let mut records = packed.serialize();
        // Unchained reservations keep their original spot.
        records.extend(
            leftovers
                .iter()
                .map(|(resource, i)| ReservationRecord::from_interval(resource, i)),
        );
        Ok(records)
    }
}

fn record_placement(placed: bool) {
    let outcome = if placed { "placed" } else { "unplaced" };
    metrics::counter!(crate::observability::PLACEMENTS_TOTAL, "outcome" => outcome).increment(1);
}
