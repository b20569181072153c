//! Inventory documents: `{"winstrom": {"udalost": [event, ...]}}`.
//!
//! Each event is one reservation. Its subject (`predmet`) names the parking
//! spot; an empty subject marks a request still waiting for a spot. On the way
//! back only the subject of each event is rewritten, every other field is
//! passed through untouched.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::engine::{EngineError, Timetable};
use crate::model::*;
use crate::snapshot::parse_span;

const ROOT: &str = "winstrom";
const EVENTS: &str = "udalost";
const ID: &str = "id";
const START: &str = "zahajeni";
const END: &str = "dokonceni";
const SUBJECT: &str = "predmet";
const OWNER: &str = "zodpPrac";

/// An event without a subject, waiting for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: String,
    pub owner: String,
    pub span: Span,
}

impl PendingRequest {
    pub fn into_interval(self) -> Interval {
        Interval::new(self.id, self.owner, self.span)
    }
}

pub fn events(document: &Value) -> Result<&Vec<Value>, EngineError> {
    document
        .get(ROOT)
        .and_then(|root| root.get(EVENTS))
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::MalformedInput(format!("missing {ROOT}.{EVENTS} array")))
}

fn events_mut(document: &mut Value) -> Result<&mut Vec<Value>, EngineError> {
    document
        .get_mut(ROOT)
        .and_then(|root| root.get_mut(EVENTS))
        .and_then(Value::as_array_mut)
        .ok_or_else(|| EngineError::MalformedInput(format!("missing {ROOT}.{EVENTS} array")))
}

/// Ids arrive as strings but numbers are accepted too.
fn event_id(event: &Value) -> Option<String> {
    match event.get(ID)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field<'a>(event: &'a Value, key: &str) -> &'a str {
    event.get(key).and_then(Value::as_str).unwrap_or("")
}

fn required_field<'a>(event: &'a Value, key: &str, pos: usize) -> Result<&'a str, EngineError> {
    event
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedInput(format!("event #{pos}: missing {key}")))
}

/// Catalog made of the distinct subjects in document order, all reservable.
pub fn derive_catalog(document: &Value) -> Result<Vec<CatalogEntry>, EngineError> {
    let mut catalog: Vec<CatalogEntry> = Vec::new();
    for event in events(document)? {
        let subject = text_field(event, SUBJECT);
        if !subject.is_empty() && !catalog.iter().any(|c| c.name == subject) {
            catalog.push(CatalogEntry::reservable(subject));
        }
    }
    Ok(catalog)
}

/// Split a document into the timetable of placed events and the pending ones.
///
/// An empty `catalog` is replaced by [`derive_catalog`]. The document itself is
/// kept as the timetable's external payload for [`write_back`]. Event ids must
/// be unique across the document, numeric and string forms alike.
pub fn load(
    catalog: &[CatalogEntry],
    document: Value,
) -> Result<(Timetable, Vec<PendingRequest>), EngineError> {
    let derived;
    let catalog = if catalog.is_empty() {
        derived = derive_catalog(&document)?;
        derived.as_slice()
    } else {
        catalog
    };

    let mut timetable = Timetable::new(catalog)?;
    let mut pending = Vec::new();
    let mut seen = HashSet::new();

    for (pos, event) in events(&document)?.iter().enumerate() {
        let id = event_id(event)
            .ok_or_else(|| EngineError::MalformedInput(format!("event #{pos}: missing {ID}")))?;
        if !seen.insert(id.clone()) {
            return Err(EngineError::MalformedInput(format!("event #{pos}: duplicate id {id}")));
        }
        let span = parse_span(
            required_field(event, START, pos)?,
            required_field(event, END, pos)?,
        )?;
        let owner = text_field(event, OWNER);
        match text_field(event, SUBJECT) {
            "" => pending.push(PendingRequest {
                id,
                owner: owner.to_string(),
                span,
            }),
            subject => timetable.insert(subject, Interval::new(id, owner, span))?,
        }
    }

    tracing::debug!(
        placed = timetable.interval_count(),
        pending = pending.len(),
        "inventory document loaded"
    );
    timetable.set_external(document);
    Ok((timetable, pending))
}

/// The timetable's source document with each held event's subject set to the
/// resource now holding it.
pub fn write_back(timetable: &Timetable) -> Result<Value, EngineError> {
    let mut document = timetable
        .external()
        .cloned()
        .ok_or_else(|| EngineError::MalformedInput("timetable has no source document".into()))?;

    let holder: HashMap<&str, &str> = timetable
        .assignments()
        .map(|(resource, interval)| (interval.id.as_str(), resource))
        .collect();

    for event in events_mut(&mut document)? {
        let Some(resource) = event_id(event).and_then(|id| holder.get(id.as_str()).copied()) else {
            continue;
        };
        if let Some(fields) = event.as_object_mut() {
            fields.insert(SUBJECT.to_string(), Value::String(resource.to_string()));
        }
    }
    Ok(document)
}
