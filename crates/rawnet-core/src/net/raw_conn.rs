use crate::config::ConnConfig;
use crate::control::{ControlFlags, ControlMessage};
use crate::error::{Error, Result};
use crate::net::common::Endpoint;
use crate::net::platform::Ipv4ByteOrder;
use crate::net::socket::Socket;
use crate::net::SocketImpl;
use parking_lot::Mutex;
use rawnet_packet::error::Error as PacketError;
use rawnet_packet::ipv4::Ipv4Header;
use std::net::SocketAddrV4;
use std::time::Duration;
use tracing::instrument;

const MAX_DATAGRAM_SIZE: usize = u16::MAX as usize;

/// A datagram oriented `IPv4` connection.
///
/// The caller supplies the `IPv4` header of every datagram written and receives the parsed
/// header of every datagram read.
pub struct RawConn<S = SocketImpl> {
    endpoint: Endpoint<S>,
    byte_order: Ipv4ByteOrder,
    recv_buf: Mutex<Vec<u8>>,
}

impl<S: Socket> RawConn<S> {
    /// Create a connection over an open raw socket.
    pub fn new(socket: S, config: &ConnConfig) -> Result<Self> {
        Self::with_byte_order(socket, config, Ipv4ByteOrder::for_platform())
    }

    fn with_byte_order(
        socket: S,
        config: &ConnConfig,
        byte_order: Ipv4ByteOrder,
    ) -> Result<Self> {
        tracing::debug!(?config, ?byte_order, "raw connection");
        Ok(Self {
            endpoint: Endpoint::new(
                socket,
                config.control_flags,
                config.poll_interval,
                config.read_timeout,
            )?,
            byte_order,
            recv_buf: Mutex::new(vec![0; MAX_DATAGRAM_SIZE]),
        })
    }

    /// Send a datagram made of `header` followed by `payload` to `header.destination`.
    ///
    /// The header must be consistent with itself and with the payload length. The header
    /// checksum is sent as given.
    ///
    /// The time-to-live is always taken from `header`. Passing a `cm` with a `ttl` fails with
    /// [`Error::UnsupportedField`].
    #[instrument(skip(self, payload), level = "trace")]
    pub fn write_to(
        &self,
        header: &Ipv4Header,
        payload: &[u8],
        cm: Option<&ControlMessage>,
    ) -> Result<usize> {
        if cm.is_some_and(|cm| cm.ttl.is_some()) {
            return Err(Error::UnsupportedField(ControlFlags::TTL));
        }
        let mut datagram = header.marshal()?;
        if header.total_length != header.header_length + payload.len() {
            return Err(PacketError::InvalidHeader(format!(
                "total length {} does not match header length {} and payload length {}",
                header.total_length,
                header.header_length,
                payload.len()
            ))
            .into());
        }
        self.byte_order.convert(&mut datagram);
        datagram.extend_from_slice(payload);
        self.endpoint.send(
            &datagram,
            cm.unwrap_or(&ControlMessage::default()),
            SocketAddrV4::new(header.destination, 0),
        )
    }

    /// Receive a single datagram, returning its header and copying its payload into `buf`.
    ///
    /// A payload larger than `buf` is silently truncated.
    #[instrument(skip(self, buf), level = "trace")]
    pub fn read_from(&self, buf: &mut [u8]) -> Result<(Ipv4Header, usize, ControlMessage)> {
        let mut recv_buf = self.recv_buf.lock();
        let (bytes_read, cm, _) = self.endpoint.recv(&mut recv_buf)?;
        let datagram = &mut recv_buf[..bytes_read];
        self.byte_order.convert(datagram);
        let header = Ipv4Header::parse(datagram)?;
        let payload = &datagram[header.header_length..];
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((header, len, cm))
    }

    /// Enable or disable delivery of the given control message fields on subsequent reads.
    pub fn set_control_message(&self, flags: ControlFlags, enable: bool) -> Result<()> {
        self.endpoint.set_control_message(flags, enable)
    }

    pub fn control_flags(&self) -> ControlFlags {
        self.endpoint.control_flags()
    }

    pub fn local_addr(&self) -> Result<SocketAddrV4> {
        self.endpoint.local_addr()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.endpoint.set_read_timeout(timeout)
    }

    /// Close the connection.
    pub fn close(&self) -> Result<()> {
        self.endpoint.close()
    }
}
