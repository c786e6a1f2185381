//! Error types for protocol selection.

/// Main error type for protocol selection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// No protocol completed initialization for the selection parameters.
    #[error("no protocol supports the selection parameters")]
    NoProtocols,

    /// Threshold overrides left no usable protocol at some message length.
    #[error("no protocol for message length {msg_length}")]
    Unsupported {
        /// First message length with no usable protocol.
        msg_length: usize,
    },

    /// The protocol registry is at capacity.
    #[error("protocol registry is full ({max} protocols)")]
    RegistryFull {
        /// Maximum number of protocols the registry can hold.
        max: usize,
    },

    /// A size or threshold string could not be parsed.
    #[error("invalid size value: {0}")]
    InvalidSize(String),
}

impl SelectError {
    /// Check if this error means the parameters are simply unsupported,
    /// as opposed to a caller bug.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::NoProtocols | Self::Unsupported { .. })
    }
}
