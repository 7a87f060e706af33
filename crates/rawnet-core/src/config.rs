use crate::control::ControlFlags;
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::{PrivilegeMode, Protocol};
    use std::time::Duration;

    /// The default value for `privilege-mode`.
    pub const DEFAULT_PRIVILEGE_MODE: PrivilegeMode = PrivilegeMode::Privileged;

    /// The default value for `protocol`.
    pub const DEFAULT_PROTOCOL: Protocol = Protocol::Icmp;

    /// The default interval a blocked read waits for readiness before checking for close.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// The default value for `read-timeout`.
    pub const DEFAULT_READ_TIMEOUT: Option<Duration> = None;
}

/// The privilege mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrivilegeMode {
    /// Privileged mode.
    Privileged,
    /// Unprivileged mode.
    Unprivileged,
}

impl PrivilegeMode {
    #[must_use]
    pub const fn is_unprivileged(self) -> bool {
        match self {
            Self::Privileged => false,
            Self::Unprivileged => true,
        }
    }
}

impl Display for PrivilegeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Privileged => write!(f, "privileged"),
            Self::Unprivileged => write!(f, "unprivileged"),
        }
    }
}

/// The transport protocol of a connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
    /// Internet Control Message Protocol
    Icmp,
    /// User Datagram Protocol
    Udp,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Icmp => write!(f, "icmp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Connection configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConnConfig {
    pub protocol: Protocol,
    pub privilege_mode: PrivilegeMode,
    pub local_addr: SocketAddrV4,
    pub control_flags: ControlFlags,
    pub poll_interval: Duration,
    pub read_timeout: Option<Duration>,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            protocol: defaults::DEFAULT_PROTOCOL,
            privilege_mode: defaults::DEFAULT_PRIVILEGE_MODE,
            local_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            control_flags: ControlFlags::empty(),
            poll_interval: defaults::DEFAULT_POLL_INTERVAL,
            read_timeout: defaults::DEFAULT_READ_TIMEOUT,
        }
    }
}
