/// State shared by the connection types.
mod common;

/// Platform specific network code.
mod platform;

/// A network socket.
mod socket;

/// Payload oriented connections.
pub mod packet_conn;

/// Whole datagram connections.
pub mod raw_conn;

pub use packet_conn::PacketConn;
pub use platform::{Ipv4ByteOrder, SocketImpl};
pub use raw_conn::RawConn;
pub use socket::Socket;
