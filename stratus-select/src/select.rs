//! The selection cache.
//!
//! [`ProtoSelect`] maps packed selection parameters to finished
//! [`SelectElem`] threshold tables. Misses run capability collection and
//! threshold construction once; every later send with the same parameters
//! is a hash lookup, or a single comparison when it hits the one-entry MRU
//! cache.
//!
//! The container is not thread-safe. Callers that want concurrent lookups
//! wrap it in their own lock and treat the MRU fast path as a write under
//! that lock.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::trace;

use stratus_core::{CfgIndex, SelectError, SelectParam, Worker};

use crate::collect::ProtoInit;
use crate::proto::ProtoRegistry;
use crate::thresholds::{thresholds_search, thresholds_sweep, ProtoConfig, ThresholdElem};

/// The selection result for one parameter set.
///
/// Owns its threshold table and the packed private configurations the
/// table's entries point into. Immutable once installed; released when the
/// owning [`ProtoSelect`] is dropped.
pub struct SelectElem {
    thresholds: Box<[ThresholdElem]>,
    priv_buf: Box<[u8]>,
}

impl SelectElem {
    /// Collect capabilities and build the threshold table for
    /// `select_param`.
    fn build(
        registry: &ProtoRegistry,
        worker: &Worker,
        ep_cfg_index: CfgIndex,
        rkey_cfg_index: Option<CfgIndex>,
        select_param: &SelectParam,
    ) -> Result<Self, SelectError> {
        trace!(
            "initialize selection for {} ep_config {} rkey_config {:?}",
            select_param,
            ep_cfg_index,
            rkey_cfg_index
        );

        let proto_init = ProtoInit::collect(
            registry,
            worker,
            ep_cfg_index,
            rkey_cfg_index,
            select_param,
        )?;
        let list = thresholds_sweep(registry, &proto_init)?;
        debug_assert!(!list.is_empty());

        let thresholds = list
            .iter()
            .map(|tmp| {
                let entry = proto_init.entry(tmp.proto_id);
                ThresholdElem {
                    max_msg_length: tmp.max_length,
                    proto_config: ProtoConfig {
                        select_param: *select_param,
                        proto_id: tmp.proto_id,
                        priv_offset: entry.priv_offset,
                        priv_len: entry.priv_len,
                    },
                }
            })
            .collect();

        // The collector's packed buffer becomes ours; the offsets resolved
        // above stay valid for the element's lifetime.
        let priv_buf = proto_init.into_priv_buf().into_boxed_slice();

        Ok(Self {
            thresholds,
            priv_buf,
        })
    }

    /// The threshold table, ordered by `max_msg_length` and terminating in
    /// `usize::MAX`.
    #[must_use]
    pub fn thresholds(&self) -> &[ThresholdElem] {
        &self.thresholds
    }

    /// Select the protocol configuration for a message of `msg_length`
    /// bytes.
    #[must_use]
    pub fn lookup(&self, msg_length: usize) -> &ProtoConfig {
        &thresholds_search(&self.thresholds, msg_length).proto_config
    }

    /// Resolve a configuration's private data.
    #[must_use]
    pub fn priv_data(&self, config: &ProtoConfig) -> &[u8] {
        &self.priv_buf[config.priv_offset..config.priv_offset + config.priv_len]
    }

    /// The parameters this element was selected for.
    #[must_use]
    pub fn select_param(&self) -> SelectParam {
        // The table is never empty and every entry carries the param copy.
        self.thresholds[0].proto_config.select_param
    }
}

/// Container of cached selections for one endpoint/remote-key
/// configuration pair.
///
/// ## Example
///
/// ```rust
/// use stratus_core::{DtClass, MemType, OpId, SelectParam};
/// use stratus_select::{ProtoRegistry, ProtoSelect};
/// # use stratus_core::{EpConfigKey, Worker};
///
/// let registry = ProtoRegistry::new();
/// let mut worker = Worker::new();
/// let ep = worker.add_ep_config(EpConfigKey::new(1.0e-6, 10.0e9));
///
/// let mut select = ProtoSelect::new();
/// let param = SelectParam::new(OpId::TagSend, DtClass::Contig, MemType::Host);
///
/// // Nothing registered: the lookup fails and caches nothing.
/// assert!(select.lookup(&registry, &worker, ep, None, &param).is_none());
/// ```
#[derive(Default)]
pub struct ProtoSelect {
    hash: AHashMap<u64, Arc<SelectElem>>,
    cache: Option<(u64, Arc<SelectElem>)>,
}

impl ProtoSelect {
    /// Create an empty selection cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_reset(&mut self) {
        self.cache = None;
    }

    /// Check the MRU cache only.
    #[must_use]
    pub fn lookup_fast(&self, select_param: &SelectParam) -> Option<&Arc<SelectElem>> {
        match &self.cache {
            Some((key, elem)) if *key == select_param.as_u64() => Some(elem),
            _ => None,
        }
    }

    /// Build and install the selection for `select_param`.
    ///
    /// Returns `None` when no protocol combination covers every message
    /// length (the cause is logged at its site); nothing is installed in
    /// that case.
    pub fn lookup_slow(
        &mut self,
        registry: &ProtoRegistry,
        worker: &Worker,
        ep_cfg_index: CfgIndex,
        rkey_cfg_index: Option<CfgIndex>,
        select_param: &SelectParam,
    ) -> Option<Arc<SelectElem>> {
        // The insert below may rehash the table; drop any cached handle
        // before the caller can observe a new one.
        self.cache_reset();

        let elem = SelectElem::build(registry, worker, ep_cfg_index, rkey_cfg_index, select_param)
            .ok()?;
        let elem = Arc::new(elem);
        self.hash.insert(select_param.as_u64(), Arc::clone(&elem));
        Some(elem)
    }

    /// Look up the selection for `select_param`, building it on a miss.
    ///
    /// The MRU cache is refreshed so an immediately repeated lookup takes
    /// the fast path.
    pub fn lookup(
        &mut self,
        registry: &ProtoRegistry,
        worker: &Worker,
        ep_cfg_index: CfgIndex,
        rkey_cfg_index: Option<CfgIndex>,
        select_param: &SelectParam,
    ) -> Option<Arc<SelectElem>> {
        if let Some(elem) = self.lookup_fast(select_param) {
            return Some(Arc::clone(elem));
        }

        let elem = if let Some(elem) = self.hash.get(&select_param.as_u64()) {
            Arc::clone(elem)
        } else {
            self.lookup_slow(registry, worker, ep_cfg_index, rkey_cfg_index, select_param)?
        };

        self.cache = Some((select_param.as_u64(), Arc::clone(&elem)));
        Some(elem)
    }

    /// Number of cached selections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hash.len()
    }

    /// Check if no selections are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    /// Iterate the cached selections.
    pub fn elems(&self) -> impl Iterator<Item = &SelectElem> {
        self.hash.values().map(Arc::as_ref)
    }
}
