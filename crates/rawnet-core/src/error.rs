use crate::control::ControlFlags;
use std::fmt::{Display, Formatter};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A connection error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A connection error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported control message field(s): {0:?}")]
    UnsupportedField(ControlFlags),
    #[error("invalid packet: {0}")]
    Packet(#[from] rawnet_packet::error::Error),
    #[error("IO error: {0}")]
    Transport(#[from] IoError),
    #[error("use of closed connection")]
    ClosedConnection,
    #[error("read timed out")]
    TimedOut,
    #[error("missing address from socket call")]
    MissingAddr,
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Bind error for {1}: {0}")]
    Bind(io::Error, SocketAddr),
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the underlying error kind.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Bind(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => e.kind(),
        }
    }
}

/// Io operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvMsg,
    LocalAddr,
    SetHeaderIncluded,
    SetPacketInfo,
    SetRecvTtl,
    GetTtl,
    SetTtl,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvMsg => write!(f, "recv msg"),
            Self::LocalAddr => write!(f, "local addr"),
            Self::SetHeaderIncluded => write!(f, "set header included"),
            Self::SetPacketInfo => write!(f, "set packet info"),
            Self::SetRecvTtl => write!(f, "set recv TTL"),
            Self::GetTtl => write!(f, "get TTL"),
            Self::SetTtl => write!(f, "set TTL"),
        }
    }
}
