//! Capability collection.
//!
//! For one selection parameter set, run every registered protocol's `init`,
//! record the capability descriptors of the ones that succeed, and pack
//! their private configurations into a single shared buffer. The collected
//! state feeds the threshold builder; on success its buffer moves into the
//! installed selection element.

use tracing::{debug, trace, warn};

use stratus_core::{CfgIndex, SelectError, SelectParam, Worker};

use crate::proto::{ProtoCaps, ProtoId, ProtoInitParams, ProtoMask, ProtoRegistry, PROTO_PRIV_MAX};

/// One successfully initialized protocol.
#[derive(Debug)]
pub(crate) struct Collected {
    pub(crate) caps: ProtoCaps,
    pub(crate) priv_offset: usize,
    pub(crate) priv_len: usize,
}

/// Capabilities and private configurations collected for one parameter set.
#[derive(Debug)]
pub(crate) struct ProtoInit {
    pub(crate) select_param: SelectParam,
    mask: ProtoMask,
    entries: Vec<Option<Collected>>,
    priv_buf: Vec<u8>,
}

impl ProtoInit {
    /// Initialize every registered protocol for `select_param`.
    ///
    /// A protocol that fails `init` (or violates the private-size contract)
    /// is excluded; only an empty result is an error.
    pub(crate) fn collect(
        registry: &ProtoRegistry,
        worker: &Worker,
        ep_cfg_index: CfgIndex,
        rkey_cfg_index: Option<CfgIndex>,
        select_param: &SelectParam,
    ) -> Result<Self, SelectError> {
        let ep_config = worker.ep_config(ep_cfg_index);
        let rkey_config = rkey_cfg_index.map(|index| worker.rkey_config(index));
        if let Some(rkey_config) = rkey_config {
            // A remote key is only meaningful for the endpoint it was
            // created on.
            assert_eq!(
                rkey_config.ep_cfg_index, ep_cfg_index,
                "rkey config belongs to another endpoint config"
            );
        }

        let params = ProtoInitParams {
            worker,
            select_param,
            ep_config,
            rkey_config,
        };

        let mut priv_buf = vec![0u8; registry.len() * PROTO_PRIV_MAX];
        let mut entries: Vec<Option<Collected>> = Vec::with_capacity(registry.len());
        entries.resize_with(registry.len(), || None);
        let mut mask = ProtoMask::empty();
        let mut offset = 0;

        for (id, protocol) in registry.iter() {
            let area = &mut priv_buf[offset..offset + PROTO_PRIV_MAX];
            let out = match protocol.init(&params, area) {
                Ok(out) => out,
                Err(err) => {
                    trace!(proto = protocol.name(), %err, "protocol excluded");
                    continue;
                }
            };

            if out.priv_size > PROTO_PRIV_MAX {
                warn!(
                    proto = protocol.name(),
                    priv_size = out.priv_size,
                    "private config exceeds the per-protocol limit, excluding"
                );
                continue;
            }
            debug_assert!(!out.caps.ranges.is_empty(), "caps must have at least one range");

            entries[id.index()] = Some(Collected {
                caps: out.caps,
                priv_offset: offset,
                priv_len: out.priv_size,
            });
            mask.set(id);
            offset += out.priv_size;
        }

        if mask.is_empty() {
            debug!("no protocols found for {select_param}");
            return Err(SelectError::NoProtocols);
        }

        priv_buf.truncate(offset);
        priv_buf.shrink_to_fit();

        Ok(Self {
            select_param: *select_param,
            mask,
            entries,
            priv_buf,
        })
    }

    /// Protocols that initialized successfully.
    pub(crate) fn mask(&self) -> ProtoMask {
        self.mask
    }

    /// Collected state of a protocol in the mask.
    pub(crate) fn entry(&self, id: ProtoId) -> &Collected {
        self.entries[id.index()]
            .as_ref()
            .expect("protocol is not in the collected mask")
    }

    /// Capability descriptor of a protocol in the mask.
    pub(crate) fn caps(&self, id: ProtoId) -> &ProtoCaps {
        &self.entry(id).caps
    }

    /// Private configuration slice of a protocol in the mask.
    pub(crate) fn priv_data(&self, id: ProtoId) -> &[u8] {
        let entry = self.entry(id);
        &self.priv_buf[entry.priv_offset..entry.priv_offset + entry.priv_len]
    }

    /// Take ownership of the packed private configurations.
    pub(crate) fn into_priv_buf(self) -> Vec<u8> {
        self.priv_buf
    }
}
