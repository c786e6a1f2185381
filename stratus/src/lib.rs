//! # Stratus
//!
//! Ahead-of-time protocol selection for high-performance communication
//! middleware.
//!
//! Stratus provides:
//! - **One-time selection**: candidate protocols report affine cost models,
//!   and their lower envelope becomes an immutable threshold table
//! - **O(1)-ish send path**: selecting a protocol is a short linear scan of
//!   the table, or a single comparison on the MRU fast path
//! - **User overrides**: per-protocol thresholds (`auto` / `inf` / a size)
//!   force protocols on or off without touching the cost models
//! - **Diagnostics**: a dump of every cached selection and the full
//!   candidate matrix behind it
//!
//! ## Quick Start
//!
//! ```rust
//! use stratus::{DtClass, EpConfigKey, MemType, OpId, ProtoRegistry, ProtoSelect,
//!               SelectParam, Worker};
//!
//! // Protocols register once, at worker construction.
//! let registry = ProtoRegistry::new();
//!
//! let mut worker = Worker::new();
//! let ep = worker.add_ep_config(EpConfigKey::new(1.0e-6, 10.0e9));
//!
//! // One selection cache per endpoint/remote-key configuration pair.
//! let mut select = ProtoSelect::new();
//! let param = SelectParam::new(OpId::TagSend, DtClass::Contig, MemType::Host);
//!
//! // With an empty registry there is nothing to select.
//! assert!(select.lookup(&registry, &worker, ep, None, &param).is_none());
//! ```
//!
//! ## Architecture
//!
//! Stratus is composed of two crates:
//!
//! - [`stratus-core`](stratus_core) - Selection parameters, cost functions,
//!   errors, and the opaque worker/configuration handles
//! - [`stratus-select`](stratus_select) - The protocol registry, capability
//!   collection, threshold construction, and the selection cache

// Re-export core types
pub use stratus_core::{
    CfgIndex, DtClass, EpConfigKey, LinearFunc, MemType, OpFlags, OpId, RkeyConfigKey,
    SelectError, SelectParam, Worker,
};

// Re-export size units
pub use stratus_core::units;

// Re-export selection
pub use stratus_select::{
    CfgThreshold, PerfRange, ProtoCaps, ProtoConfig, ProtoId, ProtoInitOut, ProtoInitParams,
    ProtoMask, ProtoRegistry, ProtoSelect, Protocol, SelectElem, ThresholdElem,
    thresholds_search, PROTO_MAX_COUNT, PROTO_PRIV_MAX,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use stratus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DtClass, MemType, OpFlags, OpId, ProtoRegistry, ProtoSelect, Protocol, SelectParam,
        Worker,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
