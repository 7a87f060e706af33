use crate::config::ConnConfig;
use crate::control::{ControlFlags, ControlMessage};
use crate::error::{Error, Result};
use crate::net::common::Endpoint;
use crate::net::socket::Socket;
use crate::net::SocketImpl;
use parking_lot::Mutex;
use rawnet_packet::ipv4::Ipv4Packet;
use std::net::SocketAddrV4;
use std::time::Duration;
use tracing::instrument;

/// The largest datagram which may be received.
const MAX_DATAGRAM_SIZE: usize = u16::MAX as usize;

/// A payload oriented `IPv4` connection.
///
/// Writes send the given payload as a single datagram and reads return a single datagram's
/// payload. When the underlying socket delivers the `IPv4` header with received datagrams the
/// header is removed, so callers only ever see the payload.
///
/// A `PacketConn` may be shared between threads; a read blocked in one thread returns
/// [`Error::ClosedConnection`] when another thread calls [`PacketConn::close`].
pub struct PacketConn<S = SocketImpl> {
    endpoint: Endpoint<S>,
    recv_buf: Mutex<Vec<u8>>,
}

impl<S: Socket> PacketConn<S> {
    /// Create a connection over an open socket.
    ///
    /// The control flags of the config are enabled on the socket; the other socket related
    /// config fields are not used.
    pub fn new(socket: S, config: &ConnConfig) -> Result<Self> {
        tracing::debug!(?config, "packet connection");
        Ok(Self {
            endpoint: Endpoint::new(
                socket,
                config.control_flags,
                config.poll_interval,
                config.read_timeout,
            )?,
            recv_buf: Mutex::new(vec![0; MAX_DATAGRAM_SIZE]),
        })
    }

    /// Send `payload` to `dst`, returning the number of bytes sent.
    #[instrument(skip(self, payload), level = "trace")]
    pub fn write_to(
        &self,
        payload: &[u8],
        cm: Option<&ControlMessage>,
        dst: SocketAddrV4,
    ) -> Result<usize> {
        self.endpoint
            .send(payload, cm.unwrap_or(&ControlMessage::default()), dst)
    }

    /// Receive a single datagram payload into `buf`.
    ///
    /// A payload larger than `buf` is silently truncated. Returns the number of bytes copied,
    /// the control message populated according to the active flags and the sender.
    #[instrument(skip(self, buf), level = "trace")]
    pub fn read_from(&self, buf: &mut [u8]) -> Result<(usize, ControlMessage, SocketAddrV4)> {
        let header_included = self.endpoint.header_included()?;
        let mut recv_buf = self.recv_buf.lock();
        let (bytes_read, cm, addr) = self.endpoint.recv(&mut recv_buf)?;
        let datagram = &recv_buf[..bytes_read];
        let view;
        let payload = if header_included {
            view = Ipv4Packet::new_view(datagram)?;
            view.payload()
        } else {
            datagram
        };
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((len, cm, addr.ok_or(Error::MissingAddr)?))
    }

    /// Enable or disable delivery of the given control message fields on subsequent reads.
    ///
    /// Enabling a field the socket cannot supply fails with [`Error::UnsupportedField`] and
    /// leaves the active flags unchanged.
    pub fn set_control_message(&self, flags: ControlFlags, enable: bool) -> Result<()> {
        self.endpoint.set_control_message(flags, enable)
    }

    /// The active control flags.
    pub fn control_flags(&self) -> ControlFlags {
        self.endpoint.control_flags()
    }

    pub fn local_addr(&self) -> Result<SocketAddrV4> {
        self.endpoint.local_addr()
    }

    /// Set the maximum time a read may block, `None` to block indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.endpoint.set_read_timeout(timeout)
    }

    /// Close the connection.
    ///
    /// All subsequent operations fail with [`Error::ClosedConnection`]. Closing twice is not an
    /// error.
    pub fn close(&self) -> Result<()> {
        self.endpoint.close()
    }
}
