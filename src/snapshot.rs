//! Flat tuple form of a timetable and the timestamp conversion around it.
//!
//! A snapshot is the list of `(resource, owner, id, start, end)` records a
//! timetable is built from and serialized back to. Timestamps are RFC 3339 on
//! the outside and whole minutes since the Unix epoch on the inside.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, Timetable};
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub resource: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start: String,
    pub end: String,
}

/// RFC 3339 → minutes since the epoch, floored.
pub fn parse_timestamp(raw: &str) -> Result<Minutes, EngineError> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|e| EngineError::MalformedInput(format!("bad timestamp {raw:?}: {e}")))?;
    Ok(parsed.timestamp().div_euclid(60))
}

/// Minutes since the epoch → RFC 3339 in UTC.
pub fn format_timestamp(minutes: Minutes) -> String {
    DateTime::<Utc>::from_timestamp(minutes.saturating_mul(60), 0)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse both bounds and check `start < end` after flooring.
pub fn parse_span(start: &str, end: &str) -> Result<Span, EngineError> {
    Span::try_new(parse_timestamp(start)?, parse_timestamp(end)?)
}

/// Catalog made of the distinct resources the records name, in order, all reservable.
pub fn derive_catalog(records: &[ReservationRecord]) -> Vec<CatalogEntry> {
    let mut catalog: Vec<CatalogEntry> = Vec::new();
    for record in records {
        if !catalog.iter().any(|c| c.name == record.resource) {
            catalog.push(CatalogEntry::reservable(record.resource.clone()));
        }
    }
    catalog
}

impl ReservationRecord {
    pub fn span(&self) -> Result<Span, EngineError> {
        parse_span(&self.start, &self.end)
    }

    pub fn from_interval(resource: &str, interval: &Interval) -> Self {
        Self {
            resource: resource.to_string(),
            owner: interval.owner.clone(),
            id: Some(interval.id.clone()),
            start: format_timestamp(interval.span.start),
            end: format_timestamp(interval.span.end),
        }
    }
}

impl Timetable {
    /// Build a timetable from a catalog and existing reservations.
    ///
    /// Every record must name a catalog resource, parse, and fit into a gap on
    /// that resource. Nothing is kept if any record is rejected.
    pub fn construct(
        catalog: &[CatalogEntry],
        reservations: impl IntoIterator<Item = ReservationRecord>,
    ) -> Result<Self, EngineError> {
        let mut timetable = Timetable::new(catalog)?;
        for record in reservations {
            let span = record.span()?;
            let interval = match record.id {
                Some(id) => Interval::new(id, record.owner, span),
                None => Interval::with_generated_id(record.owner, span),
            };
            timetable.insert(&record.resource, interval)?;
        }
        tracing::debug!(
            resources = timetable.resources().len(),
            intervals = timetable.interval_count(),
            "timetable constructed"
        );
        Ok(timetable)
    }

    /// Snapshot in catalog order, each resource's intervals ascending.
    pub fn serialize(&self) -> Vec<ReservationRecord> {
        self.assignments()
            .map(|(resource, interval)| ReservationRecord::from_interval(resource, interval))
            .collect()
    }
}
