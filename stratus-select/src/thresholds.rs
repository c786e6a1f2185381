//! Threshold table construction.
//!
//! The builder sweeps message length from 0 upward. At each position it
//! narrows the sweep to the widest interval over which the set of candidate
//! protocols and their cost functions are constant (`select_next`), then
//! computes the lower envelope of the candidates' affine costs over that
//! interval (`select_best`), emitting one threshold entry per envelope
//! segment. The sweep ends once an interval reaching `usize::MAX` has been
//! emitted, so the finished table covers every message length.

use smallvec::SmallVec;
use tracing::{trace, warn};

use stratus_core::units::{format_range, format_size};
use stratus_core::{LinearFunc, SelectError, SelectParam};

use crate::collect::ProtoInit;
use crate::proto::{CfgThreshold, ProtoId, ProtoMask, ProtoRegistry, PROTO_MAX_COUNT};

/// Evaluation offset in message-length units. Comparing at `start + ε`
/// moves the sample point off the integer boundary where two cost lines may
/// tie exactly.
const MSGLEN_EPSILON: f64 = 0.5;

/// The protocol configuration selected for one threshold interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtoConfig {
    /// Parameters this configuration was selected for.
    pub select_param: SelectParam,

    /// Selected protocol.
    pub proto_id: ProtoId,

    pub(crate) priv_offset: usize,
    pub(crate) priv_len: usize,
}

/// One entry of a threshold table: `proto_config` services every message
/// length up to and including `max_msg_length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdElem {
    /// Largest message length this entry covers (inclusive).
    pub max_msg_length: usize,

    /// Selected protocol configuration.
    pub proto_config: ProtoConfig,
}

/// Find the entry servicing `msg_length` by linear scan.
///
/// The table's last entry always covers `usize::MAX`, so the scan
/// terminates. Tables are short (typically 2-6 entries); a linear scan
/// beats a binary search at this size.
#[must_use]
pub fn thresholds_search(thresholds: &[ThresholdElem], msg_length: usize) -> &ThresholdElem {
    let mut index = 0;
    while msg_length > thresholds[index].max_msg_length {
        index += 1;
    }
    &thresholds[index]
}

/// Temporary threshold entry, before priv offsets are resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreshTmp {
    pub(crate) max_length: usize,
    pub(crate) proto_id: ProtoId,
}

pub(crate) type ThreshList = SmallVec<[ThreshTmp; 16]>;

/// Append an interval, extending the previous entry when it carries the
/// same protocol.
fn thresholds_append(list: &mut ThreshList, max_length: usize, proto_id: ProtoId) {
    if let Some(last) = list.last_mut() {
        debug_assert!(
            max_length > last.max_length,
            "max_length={} last.max_length={}",
            max_length,
            last.max_length
        );
        if last.proto_id == proto_id {
            last.max_length = max_length;
            return;
        }
    }
    list.push(ThreshTmp {
        max_length,
        proto_id,
    });
}

/// Compute the lower envelope of the active protocols' cost functions over
/// `[start, end]` (inclusive) and append one entry per envelope segment.
///
/// Each iteration picks the cheapest protocol just past `start` (at
/// `start + ε`; strict `<` comparison over ascending ids makes the lowest
/// id win exact ties) and finds the nearest intersection with any other
/// active line strictly past `start` - the first handoff point. The winner
/// is then dropped from the active set: its segment is committed, and the
/// next segment must belong to a different protocol, which bounds the loop
/// at one iteration per active protocol. An intersection landing inside
/// `(start, start + ε)` still counts; the ε-shifted sample decides such
/// near-ties and is not corrected afterwards.
fn thresholds_select_best(
    registry: &ProtoRegistry,
    mut proto_mask: ProtoMask,
    proto_perf: &[LinearFunc; PROTO_MAX_COUNT],
    list: &mut ThreshList,
    mut start: usize,
    end: usize,
) {
    trace!("candidate protocols for [{}]:", format_range(start, end));
    for proto_id in proto_mask.iter() {
        let perf = &proto_perf[proto_id.index()];
        trace!(
            "{:>24} {:.0}+{:.3}*X nsec",
            registry.name(proto_id),
            perf.c * 1e9,
            perf.m * 1e9
        );
    }

    loop {
        debug_assert!(!proto_mask.is_empty());

        // Find the best protocol just past 'start'.
        let mut best: Option<(ProtoId, f64)> = None;
        for proto_id in proto_mask.iter() {
            let result = proto_perf[proto_id.index()].apply(start as f64 + MSGLEN_EPSILON);
            if best.map_or(true, |(_, best_result)| result < best_result) {
                best = Some((proto_id, result));
            }
        }
        let (best_id, _) = best.expect("active protocol mask is empty");

        trace!(
            "  best protocol at {} is {}",
            format_size(start),
            registry.name(best_id)
        );

        // Find the first (smallest) intersection point between the best
        // protocol and any other, strictly after 'start'. That is where
        // another protocol takes over. Intersections at or before 'start'
        // mean the best protocol stays ahead through 'end' as well.
        let mut midpoint = end;
        proto_mask.clear(best_id);
        for proto_id in proto_mask.iter() {
            let intersect =
                proto_perf[proto_id.index()].intersect(&proto_perf[best_id.index()]);
            match intersect {
                Some(x_intersect) if x_intersect > start as f64 => {
                    if x_intersect < usize::MAX as f64 {
                        midpoint = midpoint.min(x_intersect as usize);
                    }
                    trace!(
                        "   - intersects with {} at {:.2}, midpoint is {}",
                        registry.name(proto_id),
                        x_intersect,
                        format_size(midpoint)
                    );
                }
                _ => {
                    trace!("   - intersects with {} out of range", registry.name(proto_id));
                }
            }
        }

        thresholds_append(list, midpoint, best_id);

        if midpoint >= end {
            return;
        }
        start = midpoint + 1;
    }
}

/// Select protocols starting at `msg_length`, returning the last message
/// length the emitted entries cover.
///
/// Narrows `[msg_length, usize::MAX]` down to the widest interval where the
/// candidate set is constant: every valid protocol's containing range and
/// every not-yet-active finite threshold override caps the interval. User
/// overrides are applied here - `Disabled` protocols drop out entirely, a
/// finite threshold disables the protocol below it and forces it at and
/// above it, and when any valid protocol is forced, only forced protocols
/// compete.
fn thresholds_select_next(
    registry: &ProtoRegistry,
    proto_mask: ProtoMask,
    proto_init: &ProtoInit,
    list: &mut ThreshList,
    msg_length: usize,
) -> Result<usize, SelectError> {
    let mut valid_mask = ProtoMask::empty();
    let mut forced_mask = ProtoMask::empty();
    let mut max_length = usize::MAX;
    let mut proto_perf = [LinearFunc::ZERO; PROTO_MAX_COUNT];

    for proto_id in proto_mask.iter() {
        let caps = proto_init.caps(proto_id);

        if msg_length < caps.min_length {
            trace!(
                "skipping proto {} with min_length {} for msg_length {}",
                registry.name(proto_id),
                caps.min_length,
                msg_length
            );
            continue;
        }

        // Find the first (and only) range containing 'msg_length'.
        for range in &caps.ranges {
            if msg_length <= range.max_length {
                valid_mask.set(proto_id);
                proto_perf[proto_id.index()] = range.perf;
                max_length = max_length.min(range.max_length);
                break;
            }
        }

        match caps.cfg_thresh {
            CfgThreshold::Auto => {}
            CfgThreshold::Disabled => {
                valid_mask.clear(proto_id);
            }
            CfgThreshold::ForceAt(cfg_thresh) => {
                if cfg_thresh <= msg_length {
                    forced_mask.set(proto_id);
                } else {
                    // Disabled up to 'cfg_thresh' - 1.
                    max_length = max_length.min(cfg_thresh - 1);
                    valid_mask.clear(proto_id);
                }
            }
        }
    }
    debug_assert!(msg_length <= max_length);

    if valid_mask.is_empty() {
        return Err(SelectError::Unsupported { msg_length });
    }

    // Forced protocols, when present, are the only candidates.
    let forced_valid = forced_mask & valid_mask;
    if !forced_valid.is_empty() {
        valid_mask = forced_valid;
    }

    thresholds_select_best(registry, valid_mask, &proto_perf, list, msg_length, max_length);
    Ok(max_length)
}

/// Sweep `[0, usize::MAX]`, emitting a coalesced threshold list covering
/// every message length.
pub(crate) fn thresholds_sweep(
    registry: &ProtoRegistry,
    proto_init: &ProtoInit,
) -> Result<ThreshList, SelectError> {
    let mut list = ThreshList::new();
    let mut msg_length = 0;

    loop {
        let max_length = thresholds_select_next(
            registry,
            proto_init.mask(),
            proto_init,
            &mut list,
            msg_length,
        )
        .map_err(|err| {
            if let SelectError::Unsupported { msg_length } = err {
                warn!(
                    "no protocol for {} msg_length {}",
                    proto_init.select_param, msg_length
                );
            }
            err
        })?;

        if max_length == usize::MAX {
            return Ok(list);
        }
        msg_length = max_length + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::ProtoInit;
    use crate::proto::ProtoRegistry;
    use crate::testing::{test_param, test_worker, TestProto};

    fn sweep(registry: &ProtoRegistry) -> Result<Vec<(usize, usize)>, SelectError> {
        let (worker, ep) = test_worker();
        let init = ProtoInit::collect(registry, &worker, ep, None, &test_param())?;
        let list = thresholds_sweep(registry, &init)?;
        Ok(list
            .iter()
            .map(|tmp| (tmp.max_length, tmp.proto_id.index()))
            .collect())
    }

    /// Two full-range protocols crossing at 10000 bytes.
    fn crossover_registry() -> ProtoRegistry {
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("fast_start")
                    .with_range(usize::MAX, LinearFunc::new(1.0e-6, 1.0e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("high_bw")
                    .with_range(usize::MAX, LinearFunc::new(10.0e-6, 0.1e-9)),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_two_protocol_crossover() {
        // f0 = f1 at x = 9000 / 0.9 = 10000.
        let thresholds = sweep(&crossover_registry()).unwrap();
        assert_eq!(thresholds, vec![(10_000, 0), (usize::MAX, 1)]);
    }

    #[test]
    fn test_forced_threshold() {
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("fast_start")
                    .with_range(usize::MAX, LinearFunc::new(1.0e-6, 1.0e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("high_bw")
                    .with_range(usize::MAX, LinearFunc::new(10.0e-6, 0.1e-9))
                    .with_cfg_thresh(CfgThreshold::ForceAt(1024)),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(1023, 0), (usize::MAX, 1)]);
    }

    #[test]
    fn test_disabled_protocol() {
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("fast_start")
                    .with_range(usize::MAX, LinearFunc::new(1.0e-6, 1.0e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("high_bw")
                    .with_range(usize::MAX, LinearFunc::new(10.0e-6, 0.1e-9))
                    .with_cfg_thresh(CfgThreshold::Disabled),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(usize::MAX, 0)]);
    }

    #[test]
    fn test_range_split() {
        // A cheap protocol capped at 4096 hands off to an expensive
        // full-range one.
        let mut registry = ProtoRegistry::new();
        registry
            .register(TestProto::new("bounded").with_range(4096, LinearFunc::new(1.0e-6, 0.1e-9)))
            .unwrap();
        registry
            .register(
                TestProto::new("unbounded")
                    .with_range(usize::MAX, LinearFunc::new(100.0e-6, 1.0e-9)),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(4096, 0), (usize::MAX, 1)]);
    }

    #[test]
    fn test_no_coverage() {
        let mut registry = ProtoRegistry::new();
        registry
            .register(TestProto::new("bounded").with_range(4096, LinearFunc::new(1.0e-6, 0.1e-9)))
            .unwrap();

        let err = sweep(&registry).unwrap_err();
        assert_eq!(err, SelectError::Unsupported { msg_length: 4097 });
    }

    #[test]
    fn test_tie_break_by_lowest_id() {
        let mut registry = ProtoRegistry::new();
        let perf = LinearFunc::new(5.0e-6, 0.5e-9);
        registry
            .register(TestProto::new("first").with_range(usize::MAX, perf))
            .unwrap();
        registry
            .register(TestProto::new("second").with_range(usize::MAX, perf))
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(usize::MAX, 0)]);
    }

    #[test]
    fn test_coalescing_across_ranges() {
        // One protocol with two ranges but identical cost: the sweep emits
        // two intervals, the list coalesces them into one.
        let perf = LinearFunc::new(1.0e-6, 1.0e-9);
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("segmented")
                    .with_range(4096, perf)
                    .with_range(usize::MAX, perf),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(usize::MAX, 0)]);
    }

    #[test]
    fn test_min_length_gap_fails() {
        // No protocol covers [0, 63]: selection aborts at msg_length 0.
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("large_only")
                    .with_min_length(64)
                    .with_range(usize::MAX, LinearFunc::new(1.0e-6, 1.0e-9)),
            )
            .unwrap();

        let err = sweep(&registry).unwrap_err();
        assert_eq!(err, SelectError::Unsupported { msg_length: 0 });
    }

    #[test]
    fn test_forced_protocol_beats_cheaper_rival() {
        // 'slow' costs more everywhere but is forced from 2048 on.
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("cheap").with_range(usize::MAX, LinearFunc::new(1.0e-6, 0.1e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("slow")
                    .with_range(usize::MAX, LinearFunc::new(50.0e-6, 1.0e-9))
                    .with_cfg_thresh(CfgThreshold::ForceAt(2048)),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();
        assert_eq!(thresholds, vec![(2047, 0), (usize::MAX, 1)]);
    }

    #[test]
    fn test_three_way_envelope() {
        // Three lines, each winning one region: constant-ish, mid, steep.
        let mut registry = ProtoRegistry::new();
        registry
            .register(
                TestProto::new("tiny").with_range(usize::MAX, LinearFunc::new(0.5e-6, 10.0e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("medium").with_range(usize::MAX, LinearFunc::new(5.0e-6, 1.0e-9)),
            )
            .unwrap();
        registry
            .register(
                TestProto::new("bulk").with_range(usize::MAX, LinearFunc::new(50.0e-6, 0.05e-9)),
            )
            .unwrap();

        let thresholds = sweep(&registry).unwrap();

        // tiny..medium intersect at 4.5us/9ns = 500; medium..bulk at
        // 45us/0.95ns ~= 47368.
        assert_eq!(thresholds.len(), 3);
        assert_eq!(thresholds[0], (500, 0));
        assert_eq!(thresholds[1].1, 1);
        assert!((47_000..48_000).contains(&thresholds[1].0));
        assert_eq!(thresholds[2], (usize::MAX, 2));
    }

    #[test]
    fn test_search_finds_covering_entry() {
        let param = test_param();
        let config = |proto_id| ProtoConfig {
            select_param: param,
            proto_id: ProtoId::new(proto_id),
            priv_offset: 0,
            priv_len: 0,
        };
        let thresholds = [
            ThresholdElem {
                max_msg_length: 1000,
                proto_config: config(0),
            },
            ThresholdElem {
                max_msg_length: usize::MAX,
                proto_config: config(1),
            },
        ];

        assert_eq!(thresholds_search(&thresholds, 0).proto_config.proto_id.index(), 0);
        assert_eq!(thresholds_search(&thresholds, 1000).proto_config.proto_id.index(), 0);
        assert_eq!(thresholds_search(&thresholds, 1001).proto_config.proto_id.index(), 1);
        assert_eq!(
            thresholds_search(&thresholds, usize::MAX).proto_config.proto_id.index(),
            1
        );
    }
}
