use crate::model::*;

use super::Timetable;

// ── Placement ────────────────────────────────────────────────────
//
// Both queries are read-only; the caller inserts into the returned resource.

/// Gap left by placing `request` next to `intervals[pos]`, if it fits there.
///
/// After: request starts at or after the interval's end and the next interval
/// (if any) starts at or after the request's end.
/// Before: request ends at or before the interval's start and the previous
/// interval (if any) ends at or before the request's start.
fn fit_gaps(intervals: &[Interval], pos: usize, request: &Span) -> (Option<Minutes>, Option<Minutes>) {
    let current = &intervals[pos].span;

    let after = (request.start >= current.end
        && intervals
            .get(pos + 1)
            .is_none_or(|next| next.span.start >= request.end))
    .then(|| request.start - current.end);

    let before = (request.end <= current.start
        && pos
            .checked_sub(1)
            .and_then(|p| intervals.get(p))
            .is_none_or(|prev| prev.span.end <= request.start))
    .then(|| current.start - request.end);

    (after, before)
}

/// First reservable resource, in catalog order, where the request fits next to
/// an existing interval. Resources with no intervals are never matched.
pub fn find_first_feasible<'a>(timetable: &'a Timetable, request: &Span) -> Option<&'a str> {
    for rs in timetable.resources.iter().filter(|r| r.reservable) {
        for pos in 0..rs.intervals.len() {
            let (after, before) = fit_gaps(&rs.intervals, pos, request);
            if after.is_some() || before.is_some() {
                return Some(rs.name.as_str());
            }
        }
    }
    None
}

/// Reservable resource where the request leaves the smallest gap to a
/// neighbouring interval.
///
/// Equal gaps keep the earlier resource. An empty resource is only chosen when
/// no resource offers a finite gap; the first such resource wins.
pub fn find_minimal_gap<'a>(timetable: &'a Timetable, request: &Span) -> Option<&'a str> {
    let mut best: Option<(&'a str, Minutes)> = None;
    let mut empty_fallback: Option<&'a str> = None;

    for rs in timetable.resources.iter().filter(|r| r.reservable) {
        if rs.is_empty() {
            empty_fallback.get_or_insert(rs.name.as_str());
            continue;
        }
        for pos in 0..rs.intervals.len() {
            let (after, before) = fit_gaps(&rs.intervals, pos, request);
            for gap in [after, before].into_iter().flatten() {
                if best.is_none_or(|(_, g)| gap < g) {
                    best = Some((rs.name.as_str(), gap));
                }
            }
        }
    }

    match best {
        Some((name, gap)) => {
            tracing::debug!(resource = name, gap, "minimal-gap placement");
            Some(name)
        }
        None => {
            tracing::debug!(fallback = ?empty_fallback, "no adjacent fit");
            empty_fallback
        }
    }
}

/// Placement policy used by the service.
pub fn place_request<'a>(timetable: &'a Timetable, request: &Span) -> Option<&'a str> {
    find_minimal_gap(timetable, request)
}
