use crate::control::{ControlFlags, ControlMessage};
use crate::error::IoResult as Result;
use std::net::SocketAddrV4;
use std::time::Duration;

/// An open `IPv4` datagram socket.
///
/// All methods take `&self` so that a socket may be read and written from different threads.
/// The socket is closed when dropped.
#[cfg_attr(test, mockall::automock)]
pub trait Socket: Send + Sync {
    fn local_addr(&self) -> Result<Option<SocketAddrV4>>;
    /// Returns true if received datagrams start with their `IPv4` header.
    fn header_included(&self) -> bool;
    /// The ancillary fields this socket is able to deliver and honor.
    fn supported_control(&self) -> ControlFlags;
    /// Enable exactly the given ancillary fields on receive.
    fn set_control(&self, flags: ControlFlags) -> Result<()>;
    fn send_to(&self, buf: &[u8], cm: &ControlMessage, addr: SocketAddrV4) -> Result<usize>;
    /// Returns true if the socket becomes readable before the timeout, false otherwise.
    fn is_readable(&self, timeout: Duration) -> Result<bool>;
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> Result<(usize, ControlMessage, Option<SocketAddrV4>)>;
}

#[cfg(test)]
pub mod tests {
    #[macro_export]
    macro_rules! mocket_recv_from {
        ($packet: expr, $cm: expr, $addr: expr) => {
            move |buf: &mut [u8]| -> IoResult<(usize, ControlMessage, Option<SocketAddrV4>)> {
                let len = std::cmp::min($packet.len(), buf.len());
                buf[..len].copy_from_slice(&$packet[..len]);
                Ok((len, $cm, Some($addr)))
            }
        };
    }
}
