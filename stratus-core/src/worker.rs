//! Opaque worker and configuration handles.
//!
//! Protocol selection never interprets these beyond index resolution; they
//! exist to be handed back to each protocol's `init`, which reads the link
//! attributes to build its cost model.

use crate::param::MemType;

/// Index into a worker's endpoint or remote-key configuration arrays.
pub type CfgIndex = u8;

/// Endpoint configuration key.
///
/// Carries the link attributes protocols consult when estimating cost.
#[derive(Debug, Clone, PartialEq)]
pub struct EpConfigKey {
    /// Wire latency in seconds.
    pub latency: f64,

    /// Link bandwidth in bytes per second.
    pub bandwidth: f64,

    /// Largest fragment the endpoint can send in one operation.
    pub max_frag: usize,
}

impl EpConfigKey {
    /// Create a key with the given latency (seconds) and bandwidth
    /// (bytes per second).
    #[must_use]
    pub const fn new(latency: f64, bandwidth: f64) -> Self {
        Self {
            latency,
            bandwidth,
            max_frag: usize::MAX,
        }
    }

    /// Set the maximal fragment size.
    #[must_use]
    pub const fn with_max_frag(mut self, max_frag: usize) -> Self {
        self.max_frag = max_frag;
        self
    }
}

/// Remote-key configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RkeyConfigKey {
    /// The endpoint configuration this remote key was created for.
    pub ep_cfg_index: CfgIndex,

    /// Memory domain of the remote region.
    pub mem_type: MemType,
}

/// Worker handle resolving configuration indices to keys.
///
/// Selection parameters reference endpoint and remote-key configurations by
/// index; the worker owns the arrays those indices point into.
#[derive(Debug, Default)]
pub struct Worker {
    ep_configs: Vec<EpConfigKey>,
    rkey_configs: Vec<RkeyConfigKey>,
}

impl Worker {
    /// Create a worker with no configurations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint configuration, returning its index.
    pub fn add_ep_config(&mut self, key: EpConfigKey) -> CfgIndex {
        let index = self.ep_configs.len() as CfgIndex;
        self.ep_configs.push(key);
        index
    }

    /// Add a remote-key configuration, returning its index.
    pub fn add_rkey_config(&mut self, key: RkeyConfigKey) -> CfgIndex {
        let index = self.rkey_configs.len() as CfgIndex;
        self.rkey_configs.push(key);
        index
    }

    /// Resolve an endpoint configuration index.
    #[must_use]
    pub fn ep_config(&self, index: CfgIndex) -> &EpConfigKey {
        &self.ep_configs[usize::from(index)]
    }

    /// Resolve a remote-key configuration index.
    #[must_use]
    pub fn rkey_config(&self, index: CfgIndex) -> &RkeyConfigKey {
        &self.rkey_configs[usize::from(index)]
    }
}
