use super::*;

const H: Minutes = 60; // 1 hour in minutes

fn iv(owner: &str, start: Minutes, end: Minutes) -> Interval {
    Interval::with_generated_id(owner, Span::new(start, end))
}

/// Build a timetable from `(name, reservable, [(start, end)])` triples.
fn make_timetable(spec: Vec<(&str, bool, Vec<(Minutes, Minutes)>)>) -> Timetable {
    let catalog: Vec<CatalogEntry> = spec
        .iter()
        .map(|(name, reservable, _)| CatalogEntry {
            name: name.to_string(),
            reservable: *reservable,
        })
        .collect();
    let mut tt = Timetable::new(&catalog).unwrap();
    for (name, _, spans) in &spec {
        for (i, &(start, end)) in spans.iter().enumerate() {
            tt.insert(name, iv(&format!("{name}-{i}"), start, end)).unwrap();
        }
    }
    tt
}

fn scenario_a() -> Timetable {
    make_timetable(vec![
        ("p1", true, vec![(10 * H, 13 * H), (16 * H, 18 * H)]),
        ("p2", true, vec![(9 * H, 10 * H), (15 * H, 16 * H)]),
    ])
}

fn spans_of(tt: &Timetable, name: &str) -> Vec<(Minutes, Minutes)> {
    tt.resource(name)
        .unwrap()
        .intervals
        .iter()
        .map(|i| (i.span.start, i.span.end))
        .collect()
}

fn tuples(tt: &Timetable) -> Vec<(String, Minutes, Minutes)> {
    let mut all: Vec<_> = tt
        .assignments()
        .map(|(_, i)| (i.owner.clone(), i.span.start, i.span.end))
        .collect();
    all.sort();
    all
}

fn assert_sorted_and_disjoint(tt: &Timetable) {
    for rs in tt.resources() {
        for w in rs.intervals.windows(2) {
            assert!(w[0].span.end <= w[1].span.start, "{}: overlap {:?}", rs.name, w);
            assert!(w[0].span.start < w[1].span.start, "{}: unsorted {:?}", rs.name, w);
        }
    }
}

/// Small deterministic LCG so property loops don't need an RNG crate.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: i64) -> i64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as i64
    }
}

/// Fill `names.len()` reservable resources with random back-to-back-ish bookings.
fn random_timetable(seed: u64, names: &[&str], per_resource: usize) -> Timetable {
    let mut rng = Lcg(seed);
    let catalog: Vec<_> = names.iter().map(|n| CatalogEntry::reservable(*n)).collect();
    let mut tt = Timetable::new(&catalog).unwrap();
    for name in names {
        let mut t = rng.next(4 * H);
        for i in 0..per_resource {
            let len = 15 + rng.next(3 * H);
            tt.insert(name, iv(&format!("{name}-{i}"), t, t + len)).unwrap();
            t += len + rng.next(2 * H);
        }
    }
    tt
}

// ── Timetable ────────────────────────────────────────────

#[test]
fn catalog_rejects_duplicates_and_empty_names() {
    let dup = [CatalogEntry::reservable("p1"), CatalogEntry::fixed("p1")];
    assert!(matches!(Timetable::new(&dup), Err(EngineError::DuplicateResource(n)) if n == "p1"));

    let empty = [CatalogEntry::reservable("")];
    assert!(matches!(Timetable::new(&empty), Err(EngineError::MalformedInput(_))));
}

#[test]
fn catalog_preserves_order_and_reservability() {
    let catalog = [
        CatalogEntry::fixed("101"),
        CatalogEntry::reservable("102"),
        CatalogEntry::reservable("103"),
    ];
    let tt = Timetable::new(&catalog).unwrap();
    assert_eq!(tt.catalog(), catalog.to_vec());
    assert!(tt.resource("104").is_none());
}

#[test]
fn checked_insert_rejects_overlap_and_leaves_sequence_intact() {
    let mut tt = scenario_a();
    let before = spans_of(&tt, "p1");
    let result = tt.insert("p1", iv("late", 12 * H, 14 * H));
    assert!(matches!(result, Err(EngineError::Conflict { ref resource, .. }) if resource == "p1"));
    assert_eq!(spans_of(&tt, "p1"), before);
}

#[test]
fn checked_insert_accepts_touching_edges() {
    let mut tt = scenario_a();
    tt.insert("p1", iv("fill", 13 * H, 16 * H)).unwrap();
    assert_eq!(spans_of(&tt, "p1"), vec![(10 * H, 13 * H), (13 * H, 16 * H), (16 * H, 18 * H)]);
}

#[test]
fn insert_into_unknown_resource_fails() {
    let mut tt = scenario_a();
    let result = tt.insert("p9", iv("x", 0, H));
    assert!(matches!(result, Err(EngineError::UnknownResource(_))));
}

#[test]
fn remove_absent_reservation_is_noop() {
    let mut tt = scenario_a();
    let before = tt.clone();
    assert!(tt.remove("p1", &Span::new(11 * H, 12 * H)).is_none());
    assert!(tt.remove("nope", &Span::new(10 * H, 13 * H)).is_none());
    assert_eq!(tt, before);

    assert!(tt.remove("p1", &Span::new(10 * H, 13 * H)).is_some());
    assert_eq!(spans_of(&tt, "p1"), vec![(16 * H, 18 * H)]);
}

#[test]
fn earliest_reservable_ties_go_to_catalog_order() {
    let tt = make_timetable(vec![
        ("fixed", false, vec![(0, H)]),
        ("p1", true, vec![(2 * H, 3 * H)]),
        ("p2", true, vec![(2 * H, 4 * H)]),
    ]);
    assert_eq!(tt.earliest_reservable(), Some((1, 0)));
}

#[test]
fn closest_follower_skips_fixed_and_earlier_intervals() {
    let tt = make_timetable(vec![
        ("fixed", false, vec![(5 * H, 6 * H)]),
        ("p1", true, vec![(H, 2 * H), (7 * H, 8 * H)]),
        ("p2", true, vec![(6 * H, 7 * H)]),
        ("p3", true, vec![(6 * H, 9 * H)]),
    ]);
    assert_eq!(tt.closest_follower(3 * H), Some((2, 0)));
    assert_eq!(tt.closest_follower(7 * H), Some((1, 1)));
    assert_eq!(tt.closest_follower(8 * H), None);
}

#[test]
fn total_gap_ignores_fixed_resources() {
    let tt = make_timetable(vec![
        ("fixed", false, vec![(0, H), (5 * H, 6 * H)]),
        ("p1", true, vec![(0, H), (2 * H, 3 * H)]),
    ]);
    assert_eq!(tt.total_gap(), H);
}

// ── Placement ────────────────────────────────────────────

#[test]
fn scenario_a_prefers_zero_gap() {
    let tt = scenario_a();
    let request = Span::new(14 * H, 15 * H);
    assert_eq!(find_minimal_gap(&tt, &request), Some("p2"));
    assert_eq!(place_request(&tt, &request), Some("p2"));
}

#[test]
fn scenario_b_empty_resource_not_preferred() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(10 * H, 13 * H), (16 * H, 18 * H)]),
        ("p2", true, vec![(9 * H, 10 * H), (15 * H, 16 * H)]),
        ("p3", true, vec![]),
    ]);
    assert_eq!(find_minimal_gap(&tt, &Span::new(14 * H, 15 * H)), Some("p2"));
}

#[test]
fn empty_resource_is_fallback_when_nothing_fits() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(10 * H, 13 * H)]),
        ("p2", true, vec![]),
        ("p3", true, vec![]),
    ]);
    // Overlaps p1's only booking
    let request = Span::new(12 * H, 14 * H);
    assert_eq!(find_minimal_gap(&tt, &request), Some("p2"));
    assert_eq!(find_first_feasible(&tt, &request), None);
}

#[test]
fn empty_resource_loses_to_distant_fit() {
    let tt = make_timetable(vec![("p1", true, vec![]), ("p2", true, vec![(0, H)])]);
    assert_eq!(find_minimal_gap(&tt, &Span::new(100 * H, 101 * H)), Some("p2"));
}

#[test]
fn minimal_gap_tie_keeps_earlier_resource() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(8 * H, 10 * H)]),
        ("p2", true, vec![(14 * H, 15 * H)]),
    ]);
    // 1h after p1, 1h before p2
    assert_eq!(find_minimal_gap(&tt, &Span::new(11 * H, 13 * H)), Some("p1"));
}

#[test]
fn fixed_resources_never_chosen() {
    let tt = make_timetable(vec![
        ("manager", false, vec![(13 * H, 14 * H)]),
        ("p1", true, vec![(8 * H, 9 * H)]),
    ]);
    let request = Span::new(14 * H, 15 * H);
    assert_eq!(find_minimal_gap(&tt, &request), Some("p1"));
    assert_eq!(find_first_feasible(&tt, &request), Some("p1"));
}

#[test]
fn no_reservable_resource_means_no_placement() {
    let tt = make_timetable(vec![("manager", false, vec![])]);
    assert_eq!(find_minimal_gap(&tt, &Span::new(0, H)), None);
    assert_eq!(find_first_feasible(&tt, &Span::new(0, H)), None);
}

#[test]
fn overlapping_request_is_infeasible() {
    let tt = make_timetable(vec![("p1", true, vec![(10 * H, 12 * H), (13 * H, 15 * H)])]);
    // Straddles the second booking
    assert_eq!(find_minimal_gap(&tt, &Span::new(12 * H, 14 * H)), None);
    // Fits the hole exactly
    assert_eq!(find_minimal_gap(&tt, &Span::new(12 * H, 13 * H)), Some("p1"));
}

#[test]
fn first_feasible_takes_catalog_order_not_smallest_gap() {
    let tt = scenario_a();
    assert_eq!(find_first_feasible(&tt, &Span::new(14 * H, 15 * H)), Some("p1"));
}

#[test]
fn first_feasible_skips_empty_resources() {
    let tt = make_timetable(vec![("p1", true, vec![]), ("p2", true, vec![(0, H)])]);
    assert_eq!(find_first_feasible(&tt, &Span::new(2 * H, 3 * H)), Some("p2"));
}

#[test]
fn placement_before_first_interval() {
    let tt = make_timetable(vec![("p1", true, vec![(10 * H, 11 * H)]), ("p2", true, vec![(3 * H, 4 * H)])]);
    // 2h before p1's booking beats 3h after p2's
    assert_eq!(find_minimal_gap(&tt, &Span::new(7 * H, 8 * H)), Some("p1"));
}

#[test]
fn minimal_gap_is_never_worse_than_any_feasible_resource() {
    for seed in 0..40 {
        let tt = random_timetable(seed, &["a", "b", "c", "d"], 6);
        let mut rng = Lcg(seed ^ 0xfeed);
        for _ in 0..20 {
            let start = rng.next(30 * H);
            let request = Span::new(start, start + 15 + rng.next(2 * H));
            let chosen = find_minimal_gap(&tt, &request);

            // Brute force: smallest gap per resource over all free neighbours.
            let mut best: Option<(usize, Minutes)> = None;
            for (slot, rs) in tt.resources().iter().enumerate() {
                if rs.overlapping(&request).next().is_some() {
                    continue;
                }
                let after = rs.intervals.iter().filter(|i| i.span.end <= request.start).map(|i| request.start - i.span.end).min();
                let before = rs.intervals.iter().filter(|i| i.span.start >= request.end).map(|i| i.span.start - request.end).min();
                if let Some(gap) = after.into_iter().chain(before).min()
                    && best.is_none_or(|(_, g)| gap < g)
                {
                    best = Some((slot, gap));
                }
            }
            let expected = best.map(|(slot, _)| tt.resources()[slot].name.as_str());
            assert_eq!(chosen, expected, "seed {seed} request {request:?}");
        }
    }
}

#[test]
fn place_then_insert_keeps_invariants() {
    let mut tt = random_timetable(7, &["a", "b", "c"], 5);
    let mut rng = Lcg(99);
    let mut placed = 0;
    for n in 0..60 {
        let start = rng.next(30 * H);
        let request = Span::new(start, start + 30);
        if let Some(name) = place_request(&tt, &request).map(str::to_owned) {
            tt.insert(&name, iv(&format!("req-{n}"), request.start, request.end)).unwrap();
            placed += 1;
        }
        assert_sorted_and_disjoint(&tt);
    }
    assert!(placed > 0);
}

// ── Defragmentation ──────────────────────────────────────

#[test]
fn scenario_c_fixed_resource_copied_verbatim() {
    let tt = make_timetable(vec![("101", false, vec![(11 * H, 12 * H)]), ("p2", true, vec![])]);
    let before = tt.resource("101").unwrap().clone();

    let packed = defragment(tt);
    assert_eq!(packed.resource("101").unwrap(), &before);
    assert!(packed.resource("p2").unwrap().is_empty());
}

#[test]
fn defragment_chains_back_to_back() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(8 * H, 9 * H), (12 * H, 13 * H)]),
        ("p2", true, vec![(9 * H, 10 * H), (13 * H, 14 * H)]),
        ("p3", true, vec![(10 * H, 12 * H)]),
    ]);
    let packed = defragment(tt);
    assert_eq!(
        spans_of(&packed, "p1"),
        vec![(8 * H, 9 * H), (9 * H, 10 * H), (10 * H, 12 * H), (12 * H, 13 * H), (13 * H, 14 * H)]
    );
    assert!(packed.resource("p2").unwrap().is_empty());
    assert!(packed.resource("p3").unwrap().is_empty());
    assert_eq!(packed.total_gap(), 0);
}

#[test]
fn defragment_follower_ties_go_to_catalog_order() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(0, H)]),
        ("p2", true, vec![(2 * H, 3 * H)]),
        ("p3", true, vec![(2 * H, 4 * H)]),
    ]);
    let packed = defragment(tt);
    // p2's interval wins the tie and extends the chain; p3's starts chain two.
    assert_eq!(spans_of(&packed, "p1"), vec![(0, H), (2 * H, 3 * H)]);
    assert_eq!(spans_of(&packed, "p2"), vec![(2 * H, 4 * H)]);
    assert!(packed.resource("p3").unwrap().is_empty());
}

#[test]
fn defragment_leaves_fixed_slots_in_place_between_chains() {
    let tt = make_timetable(vec![
        ("p1", true, vec![(0, H), (5 * H, 6 * H)]),
        ("manager", false, vec![(3 * H, 4 * H)]),
        ("p2", true, vec![(H, 2 * H), (4 * H, 5 * H)]),
    ]);
    let packed = defragment(tt);
    assert_eq!(spans_of(&packed, "p1"), vec![(0, H), (H, 2 * H), (4 * H, 5 * H), (5 * H, 6 * H)]);
    assert_eq!(spans_of(&packed, "manager"), vec![(3 * H, 4 * H)]);
    assert!(packed.resource("p2").unwrap().is_empty());
}

#[test]
fn defragment_with_no_reservable_resources() {
    let tt = make_timetable(vec![("a", false, vec![(0, H)]), ("b", false, vec![(H, 2 * H)])]);
    let before = tt.clone();
    let (packed, leftovers) = defragment_with_leftovers(tt);
    assert!(leftovers.is_empty());
    assert_eq!(packed.resources(), before.resources());
}

#[test]
fn defragment_carries_external_payload() {
    let mut tt = scenario_a();
    tt.set_external(serde_json::json!({"winstrom": {"udalost": []}}));
    let packed = defragment(tt);
    assert_eq!(packed.external(), Some(&serde_json::json!({"winstrom": {"udalost": []}})));
}

#[test]
fn defragment_preserves_reservations() {
    for seed in 0..40 {
        let tt = random_timetable(seed, &["a", "b", "c", "d", "e"], 8);
        let expected = tuples(&tt);

        let (packed, leftovers) = defragment_with_leftovers(tt);
        assert_sorted_and_disjoint(&packed);
        assert!(leftovers.is_empty(), "seed {seed}: {leftovers:?}");
        assert_eq!(tuples(&packed), expected, "seed {seed}");
    }
}

#[test]
fn defragment_never_adds_chains() {
    for seed in 0..40 {
        let tt = random_timetable(seed, &["a", "b", "c", "d"], 6);
        let used_before = tt.resources().iter().filter(|r| !r.is_empty()).count();
        let packed = defragment(tt);
        let used_after = packed.resources().iter().filter(|r| !r.is_empty()).count();
        assert!(used_after <= used_before, "seed {seed}");
    }
}
