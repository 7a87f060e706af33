//! Wire formats for raw `IPv4` datagram I/O.
//!
//! The following are supported:
//! - `ICMPv4` packet views and the owned [`message::IcmpMessage`] codec
//! - `IPv4` packet views and the owned [`ipv4::Ipv4Header`]
//! - Internet checksums
//!
//! # Endianness
//!
//! The internal representation is held in network byte order (big-endian) and
//! all accessor methods take and return data in host byte order, converting as
//! necessary for the given architecture.
//!
//! # Example
//!
//! The following example builds an `ICMPv4` echo request and parses it back:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use rawnet_packet::icmpv4::IcmpType;
//! use rawnet_packet::message::IcmpMessage;
//!
//! let bytes = IcmpMessage::echo_request(1234, 10, &[]).marshal()?;
//! assert_eq!(bytes, hex_literal::hex!("08 00 f3 23 04 d2 00 0a"));
//! let parsed = IcmpMessage::parse(&bytes)?;
//! assert_eq!(IcmpType::EchoRequest, parsed.icmp_type);
//! assert_eq!(Some(10), parsed.echo_body().map(|echo| echo.sequence));
//! # Ok(())
//! # }
//! ```
//!
//! The following example reads the fields of an `IPv4` header:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use rawnet_packet::ipv4::Ipv4Header;
//! use rawnet_packet::IpProtocol;
//! use std::net::Ipv4Addr;
//!
//! let buf = hex_literal::hex!("45 00 00 1c 00 00 40 00 0a 01 00 00 01 02 03 04 05 06 07 08");
//! let header = Ipv4Header::parse(&buf)?;
//! assert_eq!(28, header.total_length);
//! assert_eq!(10, header.ttl);
//! assert_eq!(IpProtocol::Icmp, header.protocol);
//! assert_eq!(Ipv4Addr::new(5, 6, 7, 8), header.destination);
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod buffer;

/// Packet errors.
pub mod error;

/// Functions for calculating network checksums.
pub mod checksum;

/// `ICMPv4` packets.
pub mod icmpv4;

/// Owned `ICMPv4` messages.
pub mod message;

/// `IPv4` packets.
pub mod ipv4;

/// The IP packet next layer protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IpProtocol {
    Icmp,
    Udp,
    Tcp,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::Udp => 17,
            Self::Tcp => 6,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Icmp,
            17 => Self::Udp,
            6 => Self::Tcp,
            p => Self::Other(p),
        }
    }
}

/// Format a payload as a hexadecimal string.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}
