//! Diagnostic dump of cached selections.
//!
//! For every cached parameter set the dump prints the chosen threshold
//! table, then the full candidate matrix: each protocol that initialized
//! successfully, all of its capability ranges, estimated time, bandwidth,
//! the configured threshold, and the protocol's own rendering of its
//! private configuration.

use std::io::{self, Write};

use stratus_core::units::format_range;
use stratus_core::{CfgIndex, SelectParam, Worker};

use crate::collect::ProtoInit;
use crate::proto::ProtoRegistry;
use crate::select::{ProtoSelect, SelectElem};

const MIB: f64 = (1 << 20) as f64;

impl ProtoSelect {
    /// Write a human-readable report of every cached selection.
    pub fn dump<W: Write>(
        &self,
        registry: &ProtoRegistry,
        worker: &Worker,
        ep_cfg_index: CfgIndex,
        rkey_cfg_index: Option<CfgIndex>,
        out: &mut W,
    ) -> io::Result<()> {
        writeln!(out, "#")?;
        writeln!(
            out,
            "# Protocol selection for ep_config[{}]/rkey_config[{}] ({} items)",
            ep_cfg_index,
            rkey_cfg_index.map_or_else(|| "null".to_string(), |index| index.to_string()),
            self.len()
        )?;
        writeln!(out, "#")?;

        for elem in self.elems() {
            dump_elem(registry, worker, ep_cfg_index, rkey_cfg_index, elem, out)?;
        }
        Ok(())
    }
}

fn dump_elem<W: Write>(
    registry: &ProtoRegistry,
    worker: &Worker,
    ep_cfg_index: CfgIndex,
    rkey_cfg_index: Option<CfgIndex>,
    elem: &SelectElem,
    out: &mut W,
) -> io::Result<()> {
    let param = elem.select_param();
    let title = param.to_string();

    writeln!(out, "#")?;
    writeln!(out, "# {title}:")?;
    writeln!(out, "# {}", "=".repeat(title.len() + 1))?;
    writeln!(out, "#")?;

    writeln!(out, "#   Selected protocols:")?;
    dump_thresholds(registry, elem, out)?;
    writeln!(out, "#")?;

    writeln!(out, "#   Candidates:")?;
    dump_candidates(registry, worker, ep_cfg_index, rkey_cfg_index, &param, out)
}

fn dump_thresholds<W: Write>(
    registry: &ProtoRegistry,
    elem: &SelectElem,
    out: &mut W,
) -> io::Result<()> {
    writeln!(
        out,
        "#     {:<16} {:<18} {}",
        "SIZE", "PROTOCOL", "CONFIGURATION"
    )?;

    let mut range_start = 0;
    for thresh_elem in elem.thresholds() {
        let config = &thresh_elem.proto_config;
        let config_str = registry.get(config.proto_id).config_str(elem.priv_data(config));

        writeln!(
            out,
            "#     {:<16} {:<18} {}",
            format_range(range_start, thresh_elem.max_msg_length),
            registry.name(config.proto_id),
            config_str
        )?;

        range_start = thresh_elem.max_msg_length.saturating_add(1);
    }
    Ok(())
}

/// Re-run capability collection for the candidate matrix.
///
/// Dump-time state is intentionally not cached: collection is cheap at
/// diagnostic frequency, and a fresh run shows what the protocols report
/// now rather than what they reported when the selection was installed.
fn dump_candidates<W: Write>(
    registry: &ProtoRegistry,
    worker: &Worker,
    ep_cfg_index: CfgIndex,
    rkey_cfg_index: Option<CfgIndex>,
    select_param: &SelectParam,
    out: &mut W,
) -> io::Result<()> {
    let proto_init =
        match ProtoInit::collect(registry, worker, ep_cfg_index, rkey_cfg_index, select_param) {
            Ok(proto_init) => proto_init,
            Err(err) => return writeln!(out, "#     <{err}>"),
        };

    writeln!(
        out,
        "#     {:<18} {:<12} {:<20} {:<18} {:<12} {}",
        "PROTOCOL", "SIZE", "TIME (nsec)", "BANDWIDTH (MiB/s)", "THRESHOLD", "CONFIGURATION"
    )?;

    for proto_id in proto_init.mask().iter() {
        let caps = proto_init.caps(proto_id);
        let config_str = registry.get(proto_id).config_str(proto_init.priv_data(proto_id));
        let thresh_str = caps.cfg_thresh.to_string();

        let mut range_start = caps.min_length;
        for (index, range) in caps.ranges.iter().enumerate() {
            let perf_str = format!("{:5.0} + {:.3} * N", range.perf.c * 1e9, range.perf.m * 1e9);
            let bw_str = format!("{:7.2}", 1.0 / (range.perf.m * MIB));
            let first = index == 0;

            writeln!(
                out,
                "#     {:<18} {:<12} {:<20} {:<18} {:<12} {}",
                if first { registry.name(proto_id) } else { "" },
                format_range(range_start, range.max_length),
                perf_str,
                bw_str,
                if first { thresh_str.as_str() } else { "" },
                if first { config_str.as_str() } else { "" },
            )?;

            range_start = range.max_length.saturating_add(1);
        }
    }
    writeln!(out, "#")
}
