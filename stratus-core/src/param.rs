//! Selection parameters - the key that identifies one protocol selection.
//!
//! A [`SelectParam`] captures everything about a send request that influences
//! which protocol should carry it: the operation, the datatype class, the
//! memory domain, the scatter-gather entry count, and the operation
//! attributes. Two requests with equal parameters always resolve to the same
//! threshold table, so the packed bit pattern doubles as a cache key.

use std::fmt;

use bitflags::bitflags;

/// Operation identifiers at the selection boundary.
///
/// These are fixed by the surrounding middleware; selection treats them as
/// opaque tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpId {
    /// Tagged send.
    TagSend = 0,

    /// Tagged send with remote completion.
    TagSendSync = 1,

    /// Ordered stream send.
    StreamSend = 2,

    /// One-sided put to a remote key.
    Put = 3,

    /// One-sided get from a remote key.
    Get = 4,

    /// Active-message send.
    AmSend = 5,
}

impl OpId {
    /// Operation name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TagSend => "tag_send",
            Self::TagSendSync => "tag_send_sync",
            Self::StreamSend => "stream_send",
            Self::Put => "put",
            Self::Get => "get",
            Self::AmSend => "am_send",
        }
    }
}

/// Datatype class of the send buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DtClass {
    /// Contiguous buffer.
    Contig = 0,

    /// Scatter-gather list.
    Iov = 1,

    /// Generic user-defined pack/unpack.
    Generic = 2,
}

impl DtClass {
    /// Datatype class name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Contig => "contig",
            Self::Iov => "iov",
            Self::Generic => "generic",
        }
    }
}

/// Memory domain the send buffer resides in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemType {
    /// Host memory.
    Host = 0,

    /// CUDA device memory.
    Cuda = 1,

    /// ROCm device memory.
    Rocm = 2,
}

impl MemType {
    /// Memory type name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Cuda => "cuda",
            Self::Rocm => "rocm",
        }
    }
}

bitflags! {
    /// Operation attributes that influence protocol selection.
    ///
    /// Only attributes that change the outcome of selection belong here;
    /// everything else stays out of the cache key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        /// The caller prefers fast local completion over lowest latency.
        const FAST_CMPL = 1 << 0;

        /// The operation is part of a batched multi-destination send.
        const MULTI_SEND = 1 << 1;
    }
}

/// Parameters identifying one protocol selection.
///
/// Packs into a single `u64` via [`SelectParam::as_u64`]; equality and
/// hashing are over the raw bit pattern. Immutable once constructed.
///
/// ## Example
///
/// ```rust
/// use stratus_core::{DtClass, MemType, OpFlags, OpId, SelectParam};
///
/// let param = SelectParam::new(OpId::TagSend, DtClass::Contig, MemType::Host)
///     .with_flags(OpFlags::FAST_CMPL);
///
/// assert_eq!(param, param);
/// assert_ne!(
///     param.as_u64(),
///     SelectParam::new(OpId::Put, DtClass::Contig, MemType::Host).as_u64()
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectParam {
    /// Operation identifier.
    pub op_id: OpId,

    /// Operation attributes.
    pub op_flags: OpFlags,

    /// Datatype class.
    pub dt_class: DtClass,

    /// Memory domain of the send buffer.
    pub mem_type: MemType,

    /// Scatter-gather entry count, saturated at 255.
    pub sg_count: u8,
}

impl SelectParam {
    /// Create parameters for a contiguous single-entry send.
    #[must_use]
    pub const fn new(op_id: OpId, dt_class: DtClass, mem_type: MemType) -> Self {
        Self {
            op_id,
            op_flags: OpFlags::empty(),
            dt_class,
            mem_type,
            sg_count: 1,
        }
    }

    /// Set the operation attributes.
    #[must_use]
    pub const fn with_flags(mut self, op_flags: OpFlags) -> Self {
        self.op_flags = op_flags;
        self
    }

    /// Set the scatter-gather entry count (saturating).
    #[must_use]
    pub fn with_sg_count(mut self, sg_count: usize) -> Self {
        self.sg_count = sg_count.min(usize::from(u8::MAX)) as u8;
        self
    }

    /// Pack the parameters into their 64-bit key form.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        u64::from(self.op_id as u8)
            | u64::from(self.op_flags.bits()) << 8
            | u64::from(self.dt_class as u8) << 16
            | u64::from(self.mem_type as u8) << 24
            | u64::from(self.sg_count) << 32
    }
}

impl fmt::Display for SelectParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.op_id.name())?;
        write!(f, " on a {} data-type", self.dt_class.name())?;
        if self.sg_count > 1 {
            write!(f, " with {} scatter-gather entries", self.sg_count)?;
        }
        write!(f, " in {} memory", self.mem_type.name())?;
        if self.op_flags.contains(OpFlags::FAST_CMPL) {
            write!(f, " and fast completion")?;
        }
        Ok(())
    }
}
