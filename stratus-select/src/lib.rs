//! # stratus-select
//!
//! Ahead-of-time protocol selection for the Stratus middleware.
//!
//! For every combination of operation, datatype class, memory type, and
//! endpoint/remote-key configuration, this crate decides which transport
//! protocol services messages of each possible length. The decision is made
//! once: candidate protocols report piecewise-affine cost models, the
//! threshold builder computes their lower envelope, and the result is an
//! immutable threshold table. At send time, picking a protocol is a short
//! linear scan - or a single comparison when the one-entry MRU cache hits.
//!
//! The moving parts:
//!
//! - [`Protocol`] / [`ProtoRegistry`] - the plugin contract and the table
//!   of candidates
//! - [`ProtoSelect`] - the per-configuration selection cache
//! - [`SelectElem`] - one finished selection: threshold table plus packed
//!   private protocol configurations
//! - [`thresholds_search`] - the send-path lookup over a threshold table

mod collect;
mod dump;
mod proto;
mod select;
mod thresholds;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use proto::{
    CfgThreshold, PerfRange, ProtoCaps, ProtoId, ProtoInitOut, ProtoInitParams, ProtoMask,
    ProtoRegistry, Protocol, PROTO_MAX_COUNT, PROTO_PRIV_MAX,
};
pub use select::{ProtoSelect, SelectElem};
pub use thresholds::{thresholds_search, ProtoConfig, ThresholdElem};
