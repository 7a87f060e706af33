use crate::config::{ConnConfig, PrivilegeMode, Protocol};
use crate::control::ControlFlags;
use crate::error::Result;
use crate::net::{PacketConn, RawConn, SocketImpl};
use std::net::SocketAddrV4;
use std::time::Duration;

/// Build a connection.
///
/// This is a convenience builder to simplify opening a socket and wrapping it in a
/// [`PacketConn`] or [`RawConn`].
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use rawnet_core::{Builder, ControlFlags, PrivilegeMode, Protocol};
///
/// let conn = Builder::new(Protocol::Icmp)
///     .privilege_mode(PrivilegeMode::Unprivileged)
///     .control_flags(ControlFlags::TTL | ControlFlags::DST)
///     .build_packet_conn()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: ConnConfig,
}

impl Builder {
    /// Build a connection builder for a given protocol.
    #[must_use]
    pub fn new(protocol: Protocol) -> Self {
        Self {
            config: ConnConfig {
                protocol,
                ..ConnConfig::default()
            },
        }
    }

    /// Set the local address to bind to.
    ///
    /// Defaults to `0.0.0.0:0`.
    #[must_use]
    pub fn local_addr(self, local_addr: SocketAddrV4) -> Self {
        Self {
            config: ConnConfig {
                local_addr,
                ..self.config
            },
        }
    }

    /// Set the privilege mode.
    ///
    /// Only affects `ICMP` packet connections; raw connections are always privileged.
    #[must_use]
    pub fn privilege_mode(self, privilege_mode: PrivilegeMode) -> Self {
        Self {
            config: ConnConfig {
                privilege_mode,
                ..self.config
            },
        }
    }

    /// Set the control message fields delivered with each read.
    #[must_use]
    pub fn control_flags(self, control_flags: ControlFlags) -> Self {
        Self {
            config: ConnConfig {
                control_flags,
                ..self.config
            },
        }
    }

    /// Set how long a blocked read waits for data before checking whether the connection was
    /// closed.
    #[must_use]
    pub fn poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            config: ConnConfig {
                poll_interval,
                ..self.config
            },
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(self, read_timeout: Option<Duration>) -> Self {
        Self {
            config: ConnConfig {
                read_timeout,
                ..self.config
            },
        }
    }

    /// The config the builder has accumulated.
    #[must_use]
    pub const fn config(&self) -> &ConnConfig {
        &self.config
    }

    /// Open a socket and build a [`PacketConn`].
    pub fn build_packet_conn(self) -> Result<PacketConn> {
        let socket = SocketImpl::open(
            self.config.protocol,
            self.config.privilege_mode,
            self.config.local_addr,
        )?;
        PacketConn::new(socket, &self.config)
    }

    /// Open a raw socket and build a [`RawConn`].
    pub fn build_raw_conn(self) -> Result<RawConn> {
        let socket = SocketImpl::open_raw(self.config.protocol, self.config.local_addr)?;
        RawConn::new(socket, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;
    use std::net::Ipv4Addr;

    #[test]
    fn test_builder_minimal() {
        let builder = Builder::new(Protocol::Udp);
        let config = builder.config();
        assert_eq!(Protocol::Udp, config.protocol);
        assert_eq!(defaults::DEFAULT_PRIVILEGE_MODE, config.privilege_mode);
        assert_eq!(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0), config.local_addr);
        assert!(config.control_flags.is_empty());
        assert_eq!(defaults::DEFAULT_POLL_INTERVAL, config.poll_interval);
        assert_eq!(defaults::DEFAULT_READ_TIMEOUT, config.read_timeout);
    }

    #[test]
    fn test_builder_full() {
        let local_addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3500);
        let builder = Builder::new(Protocol::Icmp)
            .local_addr(local_addr)
            .privilege_mode(PrivilegeMode::Unprivileged)
            .control_flags(ControlFlags::all())
            .poll_interval(Duration::from_millis(5))
            .read_timeout(Some(Duration::from_secs(1)));
        let config = builder.config();
        assert_eq!(Protocol::Icmp, config.protocol);
        assert_eq!(PrivilegeMode::Unprivileged, config.privilege_mode);
        assert_eq!(local_addr, config.local_addr);
        assert_eq!(ControlFlags::all(), config.control_flags);
        assert_eq!(Duration::from_millis(5), config.poll_interval);
        assert_eq!(Some(Duration::from_secs(1)), config.read_timeout);
    }

    #[test]
    fn test_builder_default() {
        assert_eq!(
            defaults::DEFAULT_PROTOCOL,
            Builder::default().config().protocol
        );
    }
}
