use crate::model::*;

use super::Timetable;

// ── Defragmentation ──────────────────────────────────────────────

/// Repack reservable resources into back-to-back chains.
///
/// Consumes the input. Reservable intervals that no chain picked up are
/// dropped with it; use [`defragment_with_leftovers`] to keep them.
pub fn defragment(timetable: Timetable) -> Timetable {
    let (packed, leftovers) = defragment_with_leftovers(timetable);
    if !leftovers.is_empty() {
        tracing::warn!(count = leftovers.len(), "defragment dropped unchained reservations");
    }
    packed
}

/// Repack reservable resources into back-to-back chains, returning the new
/// timetable and whatever the chains did not absorb, each with the name of the
/// resource it was drained from.
///
/// Output slots are filled in catalog order:
/// - a non-reservable slot takes its own intervals verbatim;
/// - a reservable slot starts with the earliest remaining reservable interval
///   anywhere, then keeps appending the remaining interval that starts closest
///   after the chain's end, until none starts at or after it.
///
/// Ties go to the earlier catalog slot. Every slot is visited once; the pass
/// stops early once the input is empty.
///
/// Leftovers are empty for any valid timetable: each reservable resource's own
/// intervals form a chain, so the chains never outnumber the reservable slots.
pub fn defragment_with_leftovers(mut input: Timetable) -> (Timetable, Vec<(String, Interval)>) {
    let mut output = input.empty_like();
    output.external = input.external.take();
    let gap_before = input.total_gap();

    for slot in 0..input.resources.len() {
        if input.interval_count() == 0 {
            break;
        }

        if !input.resources[slot].reservable {
            output.resources[slot].intervals = input.take_all(slot);
            continue;
        }

        let Some((from, pos)) = input.earliest_reservable() else {
            continue;
        };
        let mut chain = vec![input.take(from, pos)];
        let mut chain_end = chain[0].span.end;

        while let Some((from, pos)) = input.closest_follower(chain_end) {
            let next = input.take(from, pos);
            chain_end = next.span.end;
            chain.push(next);
        }

        tracing::trace!(resource = %output.resources[slot].name, len = chain.len(), "chain built");
        // Ascending and non-overlapping by construction.
        output.resources[slot].intervals = chain;
    }

    let leftovers: Vec<(String, Interval)> = input
        .resources
        .iter_mut()
        .flat_map(|rs| {
            let name = rs.name.clone();
            std::mem::take(&mut rs.intervals)
                .into_iter()
                .map(move |i| (name.clone(), i))
        })
        .collect();

    tracing::debug!(
        gap_before,
        gap_after = output.total_gap(),
        leftovers = leftovers.len(),
        "defragmented"
    );
    (output, leftovers)
}
