use crate::config::{PrivilegeMode, Protocol};
use crate::control::{ControlFlags, ControlMessage};
use crate::error::{IoError, IoOperation, IoResult};
use crate::net::socket::Socket;
use itertools::Itertools;
use nix::sys::select::FdSet;
use nix::sys::socket::{recvmsg, MsgFlags, SockaddrIn};
use nix::sys::time::{TimeVal, TimeValLike};
use parking_lot::Mutex;
use socket2::{Domain, SockAddr, Type};
use std::io;
use std::io::IoSliceMut;
use std::net::{SocketAddr, SocketAddrV4};
use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;
use tracing::instrument;

/// A network socket.
pub struct SocketImpl {
    inner: socket2::Socket,
    header_included: bool,
    /// Serializes sends so a per-packet TTL override is restored before the next send.
    send_lock: Mutex<()>,
}

impl SocketImpl {
    /// Open a socket for exchanging payloads of the given protocol.
    ///
    /// Privileged `ICMP` uses a raw socket, which delivers the `IPv4` header with each
    /// received datagram. Unprivileged `ICMP` uses a datagram `ICMP` socket, which is only
    /// available on some platforms.
    #[instrument(level = "trace")]
    pub fn open(
        protocol: Protocol,
        privilege_mode: PrivilegeMode,
        addr: SocketAddrV4,
    ) -> IoResult<Self> {
        let (ty, proto, header_included) = match (protocol, privilege_mode) {
            (Protocol::Udp, _) => (Type::DGRAM, socket2::Protocol::UDP, false),
            (Protocol::Icmp, PrivilegeMode::Privileged) => {
                (Type::RAW, socket2::Protocol::ICMPV4, true)
            }
            (Protocol::Icmp, PrivilegeMode::Unprivileged) => {
                (Type::DGRAM, socket2::Protocol::ICMPV4, false)
            }
        };
        let socket = Self::new(ty, proto, header_included)?;
        socket.set_nonblocking(true)?;
        socket.bind(addr)?;
        Ok(socket)
    }

    /// Open a raw socket which sends and receives whole `IPv4` datagrams.
    #[instrument(level = "trace")]
    pub fn open_raw(protocol: Protocol, addr: SocketAddrV4) -> IoResult<Self> {
        let proto = match protocol {
            Protocol::Icmp => socket2::Protocol::ICMPV4,
            Protocol::Udp => socket2::Protocol::UDP,
        };
        let socket = Self::new(Type::RAW, proto, true)?;
        socket
            .inner
            .set_header_included_v4(true)
            .map_err(|err| IoError::Other(err, IoOperation::SetHeaderIncluded))?;
        socket.set_nonblocking(true)?;
        socket.bind(addr)?;
        Ok(socket)
    }

    fn new(ty: Type, protocol: socket2::Protocol, header_included: bool) -> IoResult<Self> {
        Ok(Self {
            inner: socket2::Socket::new(Domain::IPV4, ty, Some(protocol))
                .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
            header_included,
            send_lock: Mutex::new(()),
        })
    }

    fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
        self.inner
            .set_nonblocking(nonblocking)
            .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
    }

    fn bind(&self, addr: SocketAddrV4) -> IoResult<()> {
        self.inner
            .bind(&SockAddr::from(addr))
            .map_err(|err| IoError::Bind(err, SocketAddr::V4(addr)))
    }

    fn send_msg(&self, buf: &[u8], cm: &ControlMessage, addr: SocketAddrV4) -> IoResult<usize> {
        let sent = if cm.src.is_some() || cm.if_index.is_some() {
            ancillary::send_with_packet_info(&self.inner, buf, cm, addr)
        } else {
            self.inner.send_to(buf, &SockAddr::from(addr))
        };
        sent.map_err(|err| IoError::SendTo(err, SocketAddr::V4(addr)))
    }
}

impl Socket for SocketImpl {
    #[instrument(skip(self), level = "trace")]
    fn local_addr(&self) -> IoResult<Option<SocketAddrV4>> {
        Ok(self
            .inner
            .local_addr()
            .map_err(|err| IoError::Other(err, IoOperation::LocalAddr))?
            .as_socket_ipv4())
    }

    fn header_included(&self) -> bool {
        self.header_included
    }

    fn supported_control(&self) -> ControlFlags {
        ancillary::SUPPORTED
    }

    #[instrument(skip(self), level = "trace")]
    fn set_control(&self, flags: ControlFlags) -> IoResult<()> {
        ancillary::set_control(&self.inner, flags)
    }

    #[instrument(skip(self, buf), level = "trace")]
    fn send_to(&self, buf: &[u8], cm: &ControlMessage, addr: SocketAddrV4) -> IoResult<usize> {
        tracing::trace!(buf = format!("{:02x?}", buf.iter().format(" ")), %cm, ?addr);
        let _guard = self.send_lock.lock();
        let Some(ttl) = cm.ttl else {
            return self.send_msg(buf, cm, addr);
        };
        let previous = self
            .inner
            .ttl_v4()
            .map_err(|err| IoError::Other(err, IoOperation::GetTtl))?;
        self.inner
            .set_ttl_v4(u32::from(ttl))
            .map_err(|err| IoError::Other(err, IoOperation::SetTtl))?;
        let sent = self.send_msg(buf, cm, addr);
        self.inner
            .set_ttl_v4(previous)
            .map_err(|err| IoError::Other(err, IoOperation::SetTtl))?;
        sent
    }

    #[instrument(skip(self), level = "trace")]
    fn is_readable(&self, timeout: Duration) -> IoResult<bool> {
        let mut read = FdSet::new();
        read.insert(self.inner.as_fd());
        let readable = nix::sys::select::select(
            None,
            Some(&mut read),
            None,
            None,
            Some(&mut TimeVal::milliseconds(timeout.as_millis() as i64)),
        );
        match readable {
            Ok(readable) => Ok(readable == 1),
            Err(nix::Error::EINTR) => Ok(false),
            Err(err) => Err(IoError::Other(io::Error::from(err), IoOperation::Select)),
        }
    }

    #[instrument(skip(self, buf), level = "trace")]
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> IoResult<(usize, ControlMessage, Option<SocketAddrV4>)> {
        let mut cmsg_buf = ancillary::cmsg_buffer();
        let (bytes_read, cm, addr) = {
            let mut iov = [IoSliceMut::new(buf)];
            let msg = recvmsg::<SockaddrIn>(
                self.inner.as_raw_fd(),
                &mut iov,
                cmsg_buf.as_deref_mut(),
                MsgFlags::empty(),
            )
            .map_err(|err| IoError::Other(io::Error::from(err), IoOperation::RecvMsg))?;
            let mut cm = ControlMessage::default();
            for cmsg in msg
                .cmsgs()
                .map_err(|err| IoError::Other(io::Error::from(err), IoOperation::RecvMsg))?
            {
                ancillary::decode(cmsg, &mut cm);
            }
            (msg.bytes, cm, msg.address.map(SocketAddrV4::from))
        };
        tracing::trace!(
            buf = format!("{:02x?}", buf[..bytes_read].iter().format(" ")),
            bytes_read,
            %cm,
            ?addr
        );
        Ok((bytes_read, cm, addr))
    }
}

/// Ancillary data support, which is only available on Linux.
#[cfg(target_os = "linux")]
mod ancillary {
    use crate::control::{ControlFlags, ControlMessage};
    use crate::error::{IoError, IoOperation, IoResult};
    use nix::libc;
    use nix::sys::socket::{sendmsg, setsockopt, sockopt, ControlMessageOwned, MsgFlags};
    use nix::sys::socket::{ControlMessage as Cmsg, SockaddrIn};
    use std::io;
    use std::io::IoSlice;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::os::fd::AsRawFd;

    pub const SUPPORTED: ControlFlags = ControlFlags::all();

    pub fn cmsg_buffer() -> Option<Vec<u8>> {
        Some(nix::cmsg_space!(libc::in_pktinfo, libc::c_int))
    }

    /// `IP_PKTINFO` carries both the destination address and the interface index.
    pub fn set_control(socket: &socket2::Socket, flags: ControlFlags) -> IoResult<()> {
        setsockopt(socket, sockopt::Ipv4RecvTtl, &flags.contains(ControlFlags::TTL))
            .map_err(|err| IoError::Other(io::Error::from(err), IoOperation::SetRecvTtl))?;
        setsockopt(
            socket,
            sockopt::Ipv4PacketInfo,
            &flags.intersects(ControlFlags::DST | ControlFlags::INTERFACE),
        )
        .map_err(|err| IoError::Other(io::Error::from(err), IoOperation::SetPacketInfo))
    }

    pub fn decode(cmsg: ControlMessageOwned, cm: &mut ControlMessage) {
        match cmsg {
            ControlMessageOwned::Ipv4Ttl(ttl) => cm.ttl = u8::try_from(ttl).ok(),
            ControlMessageOwned::Ipv4PacketInfo(info) => {
                cm.dst = Some(Ipv4Addr::from(info.ipi_addr.s_addr.to_ne_bytes()));
                cm.if_index = u32::try_from(info.ipi_ifindex).ok();
            }
            _ => {}
        }
    }

    pub fn send_with_packet_info(
        socket: &socket2::Socket,
        buf: &[u8],
        cm: &ControlMessage,
        addr: SocketAddrV4,
    ) -> io::Result<usize> {
        let ifindex = libc::c_int::try_from(cm.if_index.unwrap_or_default())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let src = cm.src.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let info = libc::in_pktinfo {
            ipi_ifindex: ifindex,
            ipi_spec_dst: libc::in_addr {
                s_addr: u32::from_ne_bytes(src.octets()),
            },
            ipi_addr: libc::in_addr { s_addr: 0 },
        };
        let iov = [IoSlice::new(buf)];
        Ok(sendmsg(
            socket.as_raw_fd(),
            &iov,
            &[Cmsg::Ipv4PacketInfo(&info)],
            MsgFlags::empty(),
            Some(&SockaddrIn::from(addr)),
        )?)
    }
}

#[cfg(not(target_os = "linux"))]
mod ancillary {
    use crate::control::{ControlFlags, ControlMessage};
    use crate::error::IoResult;
    use nix::sys::socket::ControlMessageOwned;
    use std::io;
    use std::net::SocketAddrV4;

    pub const SUPPORTED: ControlFlags = ControlFlags::empty();

    pub const fn cmsg_buffer() -> Option<Vec<u8>> {
        None
    }

    #[allow(clippy::unnecessary_wraps)]
    pub const fn set_control(_socket: &socket2::Socket, _flags: ControlFlags) -> IoResult<()> {
        Ok(())
    }

    pub fn decode(_cmsg: ControlMessageOwned, _cm: &mut ControlMessage) {}

    pub fn send_with_packet_info(
        _socket: &socket2::Socket,
        _buf: &[u8],
        _cm: &ControlMessage,
        _addr: SocketAddrV4,
    ) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use nix::libc;
    use nix::sys::socket::ControlMessageOwned;
    use std::net::Ipv4Addr;

    const LOCALHOST: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);

    fn in_addr(addr: Ipv4Addr) -> libc::in_addr {
        libc::in_addr {
            s_addr: u32::from_ne_bytes(addr.octets()),
        }
    }

    #[test]
    fn test_decode_ttl_and_packet_info() {
        let mut cm = ControlMessage::default();
        ancillary::decode(ControlMessageOwned::Ipv4Ttl(64), &mut cm);
        ancillary::decode(
            ControlMessageOwned::Ipv4PacketInfo(libc::in_pktinfo {
                ipi_ifindex: 1,
                ipi_spec_dst: in_addr(Ipv4Addr::new(10, 0, 0, 1)),
                ipi_addr: in_addr(Ipv4Addr::LOCALHOST),
            }),
            &mut cm,
        );
        assert_eq!(Some(64), cm.ttl);
        assert_eq!(Some(Ipv4Addr::LOCALHOST), cm.dst);
        assert_eq!(Some(1), cm.if_index);
        assert_eq!(None, cm.src);
    }

    #[test]
    fn test_decode_out_of_range_ttl() {
        let mut cm = ControlMessage::default();
        ancillary::decode(ControlMessageOwned::Ipv4Ttl(256), &mut cm);
        assert_eq!(None, cm.ttl);
    }

    fn recv_one(socket: &SocketImpl) -> anyhow::Result<ControlMessage> {
        anyhow::ensure!(socket.is_readable(Duration::from_secs(2))?, "nothing to read");
        let mut buf = [0_u8; 64];
        let (len, cm, _) = socket.recv_from(&mut buf)?;
        assert_eq!(b"ttl", &buf[..len]);
        Ok(cm)
    }

    #[test]
    fn test_recv_ttl_over_loopback() -> anyhow::Result<()> {
        let socket = SocketImpl::open(Protocol::Udp, PrivilegeMode::Unprivileged, LOCALHOST)?;
        let addr = socket.local_addr()?.ok_or_else(|| anyhow::anyhow!("no local addr"))?;
        socket.set_control(ControlFlags::TTL)?;
        let cm = ControlMessage {
            ttl: Some(9),
            ..Default::default()
        };
        socket.send_to(b"ttl", &cm, addr)?;
        assert_eq!(Some(9), recv_one(&socket)?.ttl);
        socket.set_control(ControlFlags::empty())?;
        socket.send_to(b"ttl", &ControlMessage::default(), addr)?;
        assert_eq!(ControlMessage::default(), recv_one(&socket)?);
        Ok(())
    }
}
