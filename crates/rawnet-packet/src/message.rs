//! Structured `ICMPv4` messages.
//!
//! [`IcmpMessage`] is the owned form of an `ICMPv4` packet: it is built by a caller and
//! [marshaled](IcmpMessage::marshal) to wire bytes, or [parsed](IcmpMessage::parse) from bytes
//! received from the network.

use crate::checksum::{icmp_ipv4_checksum, internet_checksum};
use crate::error::{Error, Result};
use crate::icmpv4::echo::EchoPacket;
use crate::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
use crate::ipv4::Ipv4Packet;

/// The largest `ICMP` message which fits in an `IPv4` datagram without options.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize - Ipv4Packet::minimum_packet_size();

/// An `ICMPv4` message.
///
/// Equality compares the type, code and body. The checksum is not compared.
#[derive(Debug, Clone)]
pub struct IcmpMessage {
    pub icmp_type: IcmpType,
    pub icmp_code: IcmpCode,
    /// The checksum as found on the wire.
    ///
    /// Ignored by [`IcmpMessage::marshal`], which always computes it.
    pub checksum: u16,
    pub body: Option<MessageBody>,
}

impl PartialEq for IcmpMessage {
    fn eq(&self, other: &Self) -> bool {
        self.icmp_type == other.icmp_type
            && self.icmp_code == other.icmp_code
            && self.body == other.body
    }
}

impl Eq for IcmpMessage {}

/// The type specific body of an [`IcmpMessage`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MessageBody {
    Echo(Echo),
}

/// The body of an `EchoRequest` or `EchoReply` message.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl IcmpMessage {
    /// Create an `EchoRequest` message.
    #[must_use]
    pub fn echo_request(identifier: u16, sequence: u16, data: &[u8]) -> Self {
        Self::echo(IcmpType::EchoRequest, identifier, sequence, data)
    }

    /// Create an `EchoReply` message.
    #[must_use]
    pub fn echo_reply(identifier: u16, sequence: u16, data: &[u8]) -> Self {
        Self::echo(IcmpType::EchoReply, identifier, sequence, data)
    }

    fn echo(icmp_type: IcmpType, identifier: u16, sequence: u16, data: &[u8]) -> Self {
        Self {
            icmp_type,
            icmp_code: IcmpCode(0),
            checksum: 0,
            body: Some(MessageBody::Echo(Echo {
                identifier,
                sequence,
                data: data.to_vec(),
            })),
        }
    }

    /// The echo body, if this message has one.
    #[must_use]
    pub const fn echo_body(&self) -> Option<&Echo> {
        match &self.body {
            Some(MessageBody::Echo(echo)) => Some(echo),
            None => None,
        }
    }

    /// The number of bytes this message occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        IcmpPacket::minimum_packet_size() + self.echo_body().map_or(0, |echo| echo.data.len())
    }

    /// Marshal the message to wire bytes, computing the checksum.
    ///
    /// A message without a body is encoded with a zeroed four byte rest-of-header.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        if self.body.is_some() && !self.icmp_type.is_echo() {
            return Err(Error::InvalidField(format!(
                "echo body not valid for type {:?}",
                self.icmp_type
            )));
        }
        let len = self.wire_len();
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidField(format!(
                "message size {len} exceeds maximum {MAX_MESSAGE_SIZE}"
            )));
        }
        let mut buf = vec![0_u8; len];
        let mut echo = EchoPacket::new(&mut buf)?;
        echo.set_icmp_type(self.icmp_type);
        echo.set_icmp_code(self.icmp_code);
        if let Some(body) = self.echo_body() {
            echo.set_identifier(body.identifier);
            echo.set_sequence(body.sequence);
            echo.set_payload(&body.data);
        }
        echo.set_checksum(icmp_ipv4_checksum(echo.packet()));
        Ok(buf)
    }

    /// Parse a message from wire bytes.
    ///
    /// The checksum is verified over the bytes exactly as received.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IcmpPacket::minimum_packet_size() {
            return Err(Error::TruncatedMessage(
                IcmpPacket::minimum_packet_size(),
                bytes.len(),
            ));
        }
        let icmp = IcmpPacket::new_view(bytes)?;
        if internet_checksum(bytes) != 0 {
            return Err(Error::ChecksumMismatch(icmp.get_checksum()));
        }
        let icmp_type = icmp.get_icmp_type();
        let body = if icmp_type.is_echo() {
            let echo = EchoPacket::new_view(bytes)?;
            Some(MessageBody::Echo(Echo {
                identifier: echo.get_identifier(),
                sequence: echo.get_sequence(),
                data: echo.payload().to_vec(),
            }))
        } else {
            None
        };
        Ok(Self {
            icmp_type,
            icmp_code: icmp.get_icmp_code(),
            checksum: icmp.get_checksum(),
            body,
        })
    }
}
