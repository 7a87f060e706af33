#![allow(dead_code)]

use rawnet_core::{ControlFlags, ControlMessage, Error, PacketConn, RawConn, Socket};
use rawnet_packet::ipv4::Ipv4Header;
use std::io;
use std::net::SocketAddrV4;
use std::sync::Once;
use std::time::Duration;

/// The maximum number of datagrams read while waiting for the expected one.
pub const MAX_READS: usize = 16;

/// How long a single read may block.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("rawnet_core=debug")
            .with_test_writer()
            .init();
    });
}

/// Returns true if the error is due to a lack of privilege.
pub fn is_permission_denied(err: &Error) -> bool {
    matches!(err, Error::Transport(io) if io.kind() == io::ErrorKind::PermissionDenied)
}

/// A connection whose control flags can be changed.
pub trait ControlConn {
    fn set_control_message(&self, flags: ControlFlags, enable: bool) -> rawnet_core::Result<()>;
    fn control_flags(&self) -> ControlFlags;
}

impl<S: Socket> ControlConn for PacketConn<S> {
    fn set_control_message(&self, flags: ControlFlags, enable: bool) -> rawnet_core::Result<()> {
        Self::set_control_message(self, flags, enable)
    }

    fn control_flags(&self) -> ControlFlags {
        Self::control_flags(self)
    }
}

impl<S: Socket> ControlConn for RawConn<S> {
    fn set_control_message(&self, flags: ControlFlags, enable: bool) -> rawnet_core::Result<()> {
        Self::set_control_message(self, flags, enable)
    }

    fn control_flags(&self) -> ControlFlags {
        Self::control_flags(self)
    }
}

/// Enable or disable `flags`, dropping any flags the platform does not support.
///
/// Returns the flags which were changed.
pub fn set_control_flags(
    conn: &impl ControlConn,
    flags: ControlFlags,
    enable: bool,
) -> anyhow::Result<ControlFlags> {
    match conn.set_control_message(flags, enable) {
        Ok(()) => Ok(flags),
        Err(Error::UnsupportedField(missing)) => {
            let remaining = flags - missing;
            conn.set_control_message(remaining, enable)?;
            Ok(remaining)
        }
        Err(err) => Err(err.into()),
    }
}

/// Assert that exactly the fields selected by `active` are populated.
pub fn assert_control_message(active: ControlFlags, cm: &ControlMessage) {
    assert_eq!(active.contains(ControlFlags::TTL), cm.ttl.is_some(), "{cm}");
    assert_eq!(active.contains(ControlFlags::DST), cm.dst.is_some(), "{cm}");
    assert_eq!(
        active.contains(ControlFlags::INTERFACE),
        cm.if_index.is_some(),
        "{cm}"
    );
    assert_eq!(None, cm.src);
}

/// Write `payload` to `dst` and read datagrams until one satisfies `expected`.
///
/// Returns the payload and control message of the matching datagram.
pub fn write_then_read_payload<S: Socket>(
    conn: &PacketConn<S>,
    payload: &[u8],
    cm: Option<&ControlMessage>,
    dst: SocketAddrV4,
    expected: impl Fn(&[u8]) -> bool,
) -> anyhow::Result<(Vec<u8>, ControlMessage, SocketAddrV4)> {
    conn.set_read_timeout(Some(READ_TIMEOUT))?;
    let sent = conn.write_to(payload, cm, dst)?;
    anyhow::ensure!(sent == payload.len(), "short write {sent}");
    let mut buf = [0_u8; 1500];
    for _ in 0..MAX_READS {
        let (len, cm, peer) = conn.read_from(&mut buf)?;
        if expected(&buf[..len]) {
            return Ok((buf[..len].to_vec(), cm, peer));
        }
        tracing::debug!(len, %cm, ?peer, "skipping unexpected datagram");
    }
    anyhow::bail!("no matching datagram after {MAX_READS} reads")
}

/// Write a whole datagram and read datagrams until one satisfies `expected`.
pub fn write_then_read_datagram<S: Socket>(
    conn: &RawConn<S>,
    header: &Ipv4Header,
    payload: &[u8],
    expected: impl Fn(&Ipv4Header, &[u8]) -> bool,
) -> anyhow::Result<(Ipv4Header, Vec<u8>, ControlMessage)> {
    conn.set_read_timeout(Some(READ_TIMEOUT))?;
    conn.write_to(header, payload, None)?;
    let mut buf = [0_u8; 1500];
    for _ in 0..MAX_READS {
        let (header, len, cm) = conn.read_from(&mut buf)?;
        if expected(&header, &buf[..len]) {
            return Ok((header, buf[..len].to_vec(), cm));
        }
        tracing::debug!(len, ?header, "skipping unexpected datagram");
    }
    anyhow::bail!("no matching datagram after {MAX_READS} reads")
}
