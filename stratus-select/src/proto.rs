//! Protocol plugin contract and registry.
//!
//! A protocol is an opaque implementation strategy: selection only sees its
//! capability descriptor (which message lengths it handles, and at what
//! estimated cost) and a private configuration blob it packs for the send
//! path. Protocols live in a [`ProtoRegistry`] and are addressed by a small
//! integer [`ProtoId`]; sets of protocols are single-word bit masks.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use stratus_core::units::{format_size, parse_size};
use stratus_core::{EpConfigKey, LinearFunc, RkeyConfigKey, SelectError, SelectParam, Worker};

/// Maximal number of registered protocols (one bit per id in a mask word).
pub const PROTO_MAX_COUNT: usize = 64;

/// Per-protocol limit on private configuration size, in bytes.
pub const PROTO_PRIV_MAX: usize = 512;

/// Identifier of a registered protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoId(u8);

impl ProtoId {
    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < PROTO_MAX_COUNT);
        Self(index as u8)
    }

    /// Position of this protocol in the registry.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProtoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of protocol ids, one bit per id.
///
/// Iteration order is ascending id, which is the normative tie-break order
/// for equal-cost protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtoMask(u64);

impl ProtoMask {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a protocol to the set.
    pub fn set(&mut self, id: ProtoId) {
        self.0 |= 1 << id.index();
    }

    /// Remove a protocol from the set.
    pub fn clear(&mut self, id: ProtoId) {
        self.0 &= !(1 << id.index());
    }

    /// Check membership.
    #[must_use]
    pub const fn contains(&self, id: ProtoId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    /// Check if the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of protocols in the set.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ProtoId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(ProtoId::new(index))
        })
    }
}

impl std::ops::BitAnd for ProtoMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// User threshold override for one protocol.
///
/// Accepts the configuration forms `"auto"`, `"inf"`, and sizes like
/// `"1024"` or `"4K"` via [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CfgThreshold {
    /// No override; the protocol competes on modeled cost alone.
    #[default]
    Auto,

    /// The protocol is disabled for all message lengths.
    Disabled,

    /// The protocol is disabled below the threshold and forced on at and
    /// above it.
    ForceAt(usize),
}

impl FromStr for CfgThreshold {
    type Err = SelectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        match parse_size(value)? {
            usize::MAX => Ok(Self::Disabled),
            thresh => Ok(Self::ForceAt(thresh)),
        }
    }
}

impl fmt::Display for CfgThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Disabled => f.write_str("inf"),
            Self::ForceAt(thresh) => f.write_str(&format_size(*thresh)),
        }
    }
}

/// One capability range: up to `max_length`, cost is modeled by `perf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfRange {
    /// Largest message length this range covers (inclusive).
    pub max_length: usize,

    /// Estimated cost over the range.
    pub perf: LinearFunc,
}

/// Capability descriptor a protocol produces from `init`.
///
/// Ranges partition `[min_length, last.max_length]` contiguously with
/// strictly increasing `max_length`; the last range may extend to
/// `usize::MAX`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoCaps {
    /// Smallest supported message length.
    pub min_length: usize,

    /// Cost model, one affine function per range.
    pub ranges: SmallVec<[PerfRange; 4]>,

    /// User threshold override.
    pub cfg_thresh: CfgThreshold,
}

impl ProtoCaps {
    /// Create a descriptor with no ranges yet.
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            ranges: SmallVec::new(),
            cfg_thresh: CfgThreshold::Auto,
        }
    }

    /// Append a range ending at `max_length` (inclusive).
    #[must_use]
    pub fn with_range(mut self, max_length: usize, perf: LinearFunc) -> Self {
        debug_assert!(
            self.ranges.last().map_or(true, |last| max_length > last.max_length),
            "range max_length must be strictly increasing"
        );
        self.ranges.push(PerfRange { max_length, perf });
        self
    }

    /// Set the user threshold override.
    #[must_use]
    pub fn with_cfg_thresh(mut self, cfg_thresh: CfgThreshold) -> Self {
        self.cfg_thresh = cfg_thresh;
        self
    }
}

/// Parameters handed to each protocol's `init`.
pub struct ProtoInitParams<'a> {
    /// Worker the selection runs on.
    pub worker: &'a Worker,

    /// Parameters being selected for.
    pub select_param: &'a SelectParam,

    /// Endpoint configuration key.
    pub ep_config: &'a EpConfigKey,

    /// Remote-key configuration key, when the operation has one.
    pub rkey_config: Option<&'a RkeyConfigKey>,
}

/// Successful result of a protocol `init`.
pub struct ProtoInitOut {
    /// Capability descriptor.
    pub caps: ProtoCaps,

    /// Bytes of private configuration written, at most [`PROTO_PRIV_MAX`].
    pub priv_size: usize,
}

/// An implementation strategy selectable by the middleware.
///
/// `init` is called once per selection parameter set. Failure is non-fatal:
/// the protocol is excluded for those parameters and selection proceeds with
/// the remaining candidates.
pub trait Protocol: Send + Sync {
    /// Constant protocol name for diagnostics.
    fn name(&self) -> &'static str;

    /// Evaluate the selection parameters, produce a capability descriptor,
    /// and write the private configuration the send path will need into
    /// `priv_buf`.
    fn init(
        &self,
        params: &ProtoInitParams<'_>,
        priv_buf: &mut [u8],
    ) -> Result<ProtoInitOut, SelectError>;

    /// Render the private configuration for diagnostics.
    fn config_str(&self, priv_data: &[u8]) -> String;
}

/// Table of candidate protocols, fixed for the lifetime of the worker.
#[derive(Default)]
pub struct ProtoRegistry {
    protocols: Vec<Box<dyn Protocol>>,
}

impl ProtoRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol, returning its id.
    pub fn register(&mut self, protocol: impl Protocol + 'static) -> Result<ProtoId, SelectError> {
        if self.protocols.len() >= PROTO_MAX_COUNT {
            return Err(SelectError::RegistryFull {
                max: PROTO_MAX_COUNT,
            });
        }
        let id = ProtoId::new(self.protocols.len());
        self.protocols.push(Box::new(protocol));
        Ok(id)
    }

    /// Number of registered protocols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Resolve a protocol id.
    #[must_use]
    pub fn get(&self, id: ProtoId) -> &dyn Protocol {
        self.protocols[id.index()].as_ref()
    }

    /// Name of a registered protocol.
    #[must_use]
    pub fn name(&self, id: ProtoId) -> &'static str {
        self.get(id).name()
    }

    /// Iterate registered protocols in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ProtoId, &dyn Protocol)> {
        self.protocols
            .iter()
            .enumerate()
            .map(|(index, protocol)| (ProtoId::new(index), protocol.as_ref()))
    }
}
