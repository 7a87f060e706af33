use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create a packet view with an insufficient buffer size.
    #[error("insufficient buffer for {0} packet, minimum={1}, provided={2}")]
    InsufficientPacketBuffer(String, usize, usize),
    /// A structured value cannot be marshaled.
    #[error("invalid field: {0}")]
    InvalidField(String),
    /// Fewer bytes than the smallest valid message were provided.
    #[error("truncated message, minimum={0}, provided={1}")]
    TruncatedMessage(usize, usize),
    /// The Internet checksum over the received bytes did not verify.
    #[error("checksum mismatch, received={0:#06x}")]
    ChecksumMismatch(u16),
    /// The fields of an `IPv4` header are not consistent with each other.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
