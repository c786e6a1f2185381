//! Property tests for threshold construction.
//!
//! Randomized protocol sets verify the structural invariants of every
//! emitted table (strictly increasing bounds terminating in `usize::MAX`,
//! fully coalesced entries) and the selection invariants: the chosen
//! protocol minimizes modeled cost at the ε-shifted sample point, forced
//! protocols win at and above their threshold and never below it, and
//! disabled protocols never appear.

#![cfg(test)]

use proptest::prelude::*;

use stratus_core::LinearFunc;

use crate::proto::{CfgThreshold, ProtoRegistry};
use crate::select::{ProtoSelect, SelectElem};
use crate::testing::{test_param, test_worker, TestProto};

const NAMES: [&str; 8] = [
    "proto0", "proto1", "proto2", "proto3", "proto4", "proto5", "proto6", "proto7",
];

/// Message lengths probed by the invariant checks, plus the table's own
/// boundary points.
const PROBES: [usize; 8] = [0, 1, 1023, 1024, 4096, 10_000, 1 << 20, usize::MAX];

fn arb_perf() -> impl Strategy<Value = LinearFunc> {
    (0.0..100.0e-6f64, 0.0..10.0e-9f64).prop_map(|(c, m)| LinearFunc::new(c, m))
}

fn build_select(
    perfs: &[LinearFunc],
    cfg_thresh: &[CfgThreshold],
) -> (ProtoRegistry, Option<std::sync::Arc<SelectElem>>) {
    let mut registry = ProtoRegistry::new();
    for (index, perf) in perfs.iter().enumerate() {
        registry
            .register(
                TestProto::new(NAMES[index])
                    .with_range(usize::MAX, *perf)
                    .with_cfg_thresh(cfg_thresh[index]),
            )
            .unwrap();
    }

    let (worker, ep) = test_worker();
    let mut select = ProtoSelect::new();
    let elem = select.lookup(&registry, &worker, ep, None, &test_param());
    (registry, elem)
}

/// Table bounds strictly increase, end at `usize::MAX`, and adjacent
/// entries carry distinct protocols.
fn check_table_shape(elem: &SelectElem) {
    let thresholds = elem.thresholds();
    assert!(!thresholds.is_empty());
    assert_eq!(thresholds.last().unwrap().max_msg_length, usize::MAX);

    for pair in thresholds.windows(2) {
        assert!(pair[0].max_msg_length < pair[1].max_msg_length);
        assert_ne!(
            pair[0].proto_config.proto_id,
            pair[1].proto_config.proto_id
        );
    }
}

/// Probe points: the fixed probes plus every boundary and its neighbors.
fn probe_points(elem: &SelectElem) -> Vec<usize> {
    let mut points: Vec<usize> = PROBES.to_vec();
    for thresh_elem in elem.thresholds() {
        let max = thresh_elem.max_msg_length;
        points.push(max);
        points.push(max.saturating_add(1));
        points.push(max.saturating_sub(1));
    }
    points
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn table_shape_holds(perfs in proptest::collection::vec(arb_perf(), 1..=6)) {
        let cfg = vec![CfgThreshold::Auto; perfs.len()];
        let (_registry, elem) = build_select(&perfs, &cfg);
        let elem = elem.expect("full-range protocols always produce a table");
        check_table_shape(&elem);
    }

    #[test]
    fn selected_protocol_minimizes_cost(
        perfs in proptest::collection::vec(arb_perf(), 1..=6)
    ) {
        let cfg = vec![CfgThreshold::Auto; perfs.len()];
        let (_registry, elem) = build_select(&perfs, &cfg);
        let elem = elem.expect("full-range protocols always produce a table");

        for msg_length in probe_points(&elem) {
            let x = msg_length as f64 + 0.5;
            let selected = elem.lookup(msg_length).proto_id.index();
            let selected_cost = perfs[selected].apply(x);

            for (other, perf) in perfs.iter().enumerate() {
                // Flooring intersection points to integer boundaries can
                // shift a handoff by under one message-length unit; allow
                // that much slack on the comparison.
                let slack = 0.5 * (perfs[selected].m + perf.m) + 1e-15;
                prop_assert!(
                    selected_cost <= perf.apply(x) + slack,
                    "length {}: selected proto {} costs {:e}, proto {} costs {:e}",
                    msg_length, selected, selected_cost, other, perf.apply(x)
                );
            }
        }
    }

    #[test]
    fn forced_protocol_wins_from_threshold(
        perfs in proptest::collection::vec(arb_perf(), 2..=6),
        forced_index in 0usize..6,
        forced_at in 0usize..1_000_000,
    ) {
        let forced_index = forced_index % perfs.len();
        let mut cfg = vec![CfgThreshold::Auto; perfs.len()];
        cfg[forced_index] = CfgThreshold::ForceAt(forced_at);

        let (_registry, elem) = build_select(&perfs, &cfg);
        let elem = elem.expect("full-range protocols always produce a table");
        check_table_shape(&elem);

        for msg_length in probe_points(&elem) {
            let selected = elem.lookup(msg_length).proto_id.index();
            prop_assert_eq!(
                msg_length >= forced_at,
                selected == forced_index,
                "length {}: selected proto {}, forced proto {} at {}",
                msg_length, selected, forced_index, forced_at
            );
        }
    }

    #[test]
    fn disabled_protocol_never_appears(
        perfs in proptest::collection::vec(arb_perf(), 2..=6),
        disabled_index in 0usize..6,
    ) {
        let disabled_index = disabled_index % perfs.len();
        let mut cfg = vec![CfgThreshold::Auto; perfs.len()];
        cfg[disabled_index] = CfgThreshold::Disabled;

        let (_registry, elem) = build_select(&perfs, &cfg);
        let elem = elem.expect("other protocols still cover every length");
        check_table_shape(&elem);

        for thresh_elem in elem.thresholds() {
            prop_assert_ne!(thresh_elem.proto_config.proto_id.index(), disabled_index);
        }
    }
}
