use bitflags::bitflags;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

bitflags! {
    /// The ancillary fields a connection should deliver alongside each read.
    ///
    /// An absent flag means the matching field of a received [`ControlMessage`] is `None`.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u8 {
        /// The time-to-live of the received datagram.
        const TTL = 1;
        /// The destination address of the received datagram.
        const DST = 1 << 1;
        /// The index of the interface the datagram arrived on.
        const INTERFACE = 1 << 2;
    }
}

/// Per-packet `IPv4` ancillary data.
///
/// On read the fields selected by the active [`ControlFlags`] are populated. On write the set
/// fields override the socket defaults for that one packet; `dst` is ignored on write.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ControlMessage {
    pub ttl: Option<u8>,
    /// The source address to send from (write only).
    pub src: Option<Ipv4Addr>,
    pub dst: Option<Ipv4Addr>,
    pub if_index: Option<u32>,
}

impl ControlMessage {
    /// Keep only the received fields selected by `flags`.
    #[must_use]
    pub const fn masked(self, flags: ControlFlags) -> Self {
        Self {
            ttl: if flags.contains(ControlFlags::TTL) {
                self.ttl
            } else {
                None
            },
            src: None,
            dst: if flags.contains(ControlFlags::DST) {
                self.dst
            } else {
                None
            },
            if_index: if flags.contains(ControlFlags::INTERFACE) {
                self.if_index
            } else {
                None
            },
        }
    }

    /// The capabilities a socket needs to honor this message on write.
    ///
    /// A `ttl` override is applied with a socket option and needs no ancillary support. Source
    /// address and interface selection travel as packet info.
    #[must_use]
    pub const fn write_flags(&self) -> ControlFlags {
        if self.src.is_some() || self.if_index.is_some() {
            ControlFlags::INTERFACE
        } else {
            ControlFlags::empty()
        }
    }

    /// Is every field unset?
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ttl.is_none() && self.src.is_none() && self.dst.is_none() && self.if_index.is_none()
    }
}

impl Display for ControlMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn field<T: Display>(val: Option<&T>) -> String {
            val.map_or_else(|| String::from("<nil>"), ToString::to_string)
        }
        write!(
            f,
            "ttl={} src={} dst={} ifindex={}",
            field(self.ttl.as_ref()),
            field(self.src.as_ref()),
            field(self.dst.as_ref()),
            field(self.if_index.as_ref())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const FULL: ControlMessage = ControlMessage {
        ttl: Some(64),
        src: Some(Ipv4Addr::new(10, 0, 0, 1)),
        dst: Some(Ipv4Addr::LOCALHOST),
        if_index: Some(1),
    };

    #[test]
    fn test_default_is_empty() {
        assert!(ControlMessage::default().is_empty());
        assert!(!FULL.is_empty());
    }

    #[test_case(ControlFlags::empty(), None, None, None)]
    #[test_case(ControlFlags::TTL, Some(64), None, None)]
    #[test_case(ControlFlags::DST, None, Some(Ipv4Addr::LOCALHOST), None)]
    #[test_case(ControlFlags::INTERFACE, None, None, Some(1))]
    #[test_case(ControlFlags::all(), Some(64), Some(Ipv4Addr::LOCALHOST), Some(1))]
    fn test_masked(
        flags: ControlFlags,
        ttl: Option<u8>,
        dst: Option<Ipv4Addr>,
        if_index: Option<u32>,
    ) {
        let cm = FULL.masked(flags);
        assert_eq!(ttl, cm.ttl);
        assert_eq!(None, cm.src);
        assert_eq!(dst, cm.dst);
        assert_eq!(if_index, cm.if_index);
    }

    #[test]
    fn test_write_flags() {
        let ttl_only = ControlMessage {
            ttl: Some(1),
            ..Default::default()
        };
        assert_eq!(ControlFlags::empty(), ttl_only.write_flags());
        let dst_only = ControlMessage {
            dst: Some(Ipv4Addr::LOCALHOST),
            ..Default::default()
        };
        assert_eq!(ControlFlags::empty(), dst_only.write_flags());
        assert_eq!(ControlFlags::INTERFACE, FULL.write_flags());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            "ttl=<nil> src=<nil> dst=<nil> ifindex=<nil>",
            ControlMessage::default().to_string()
        );
        assert_eq!(
            "ttl=64 src=10.0.0.1 dst=127.0.0.1 ifindex=1",
            FULL.to_string()
        );
    }
}
