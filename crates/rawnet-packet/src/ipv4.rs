use crate::buffer::Buffer;
use crate::checksum::ipv4_header_checksum;
use crate::error::{Error, Result};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const VERSION_OFFSET: usize = 0;
const IHL_OFFSET: usize = 0;
const TOS_OFFSET: usize = 1;
const TOTAL_LENGTH_OFFSET: usize = 2;
const IDENTIFICATION_OFFSET: usize = 4;
const FLAGS_AND_FRAGMENT_OFFSET_OFFSET: usize = 6;
const TIME_TO_LIVE_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

/// The largest header length expressible in the 4-bit IHL field.
pub const MAX_HEADER_LENGTH: usize = 60;

/// Represents an IPv4 Packet.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct Ipv4Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv4Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        check_size(packet.len())?;
        Ok(Self {
            buf: Buffer::Mutable(packet),
        })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        check_size(packet.len())?;
        Ok(Self {
            buf: Buffer::Immutable(packet),
        })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        (self.buf.read(VERSION_OFFSET) & 0xf0) >> 4
    }

    /// The header length in 32-bit words.
    #[must_use]
    pub fn get_header_length(&self) -> u8 {
        self.buf.read(IHL_OFFSET) & 0xf
    }

    #[must_use]
    pub fn get_tos(&self) -> u8 {
        self.buf.read(TOS_OFFSET)
    }

    #[must_use]
    pub fn get_total_length(&self) -> u16 {
        self.buf.get_u16(TOTAL_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_identification(&self) -> u16 {
        self.buf.get_u16(IDENTIFICATION_OFFSET)
    }

    #[must_use]
    pub fn get_flags_and_fragment_offset(&self) -> u16 {
        self.buf.get_u16(FLAGS_AND_FRAGMENT_OFFSET_OFFSET)
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.read(TIME_TO_LIVE_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buf.read(PROTOCOL_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.get_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes::<4>(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.buf.get_bytes::<4>(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn get_options_raw(&self) -> &[u8] {
        let start = Self::minimum_packet_size();
        let end = std::cmp::min(start + ipv4_options_length(self), self.buf.len());
        &self.buf.as_slice()[start..end]
    }

    pub fn set_version(&mut self, val: u8) {
        let ihl = self.buf.read(VERSION_OFFSET) & 0xf;
        self.buf.write(VERSION_OFFSET, ihl | ((val & 0xf) << 4));
    }

    pub fn set_header_length(&mut self, val: u8) {
        let version = self.buf.read(IHL_OFFSET) & 0xf0;
        self.buf.write(IHL_OFFSET, version | (val & 0xf));
    }

    pub fn set_tos(&mut self, val: u8) {
        self.buf.write(TOS_OFFSET, val);
    }

    pub fn set_total_length(&mut self, val: u16) {
        self.buf.set_u16(TOTAL_LENGTH_OFFSET, val);
    }

    pub fn set_identification(&mut self, val: u16) {
        self.buf.set_u16(IDENTIFICATION_OFFSET, val);
    }

    pub fn set_flags_and_fragment_offset(&mut self, val: u16) {
        self.buf.set_u16(FLAGS_AND_FRAGMENT_OFFSET_OFFSET, val);
    }

    pub fn set_ttl(&mut self, val: u8) {
        self.buf.write(TIME_TO_LIVE_OFFSET, val);
    }

    pub fn set_protocol(&mut self, val: IpProtocol) {
        self.buf.write(PROTOCOL_OFFSET, val.id());
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_source(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(SOURCE_OFFSET, val.octets());
    }

    pub fn set_destination(&mut self, val: Ipv4Addr) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.octets());
    }

    pub fn set_options_raw(&mut self, vals: &[u8]) {
        let start = Self::minimum_packet_size();
        self.buf.as_slice_mut()[start..start + vals.len()].copy_from_slice(vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes following the header (and any options).
    ///
    /// Empty if the header length claims more bytes than the buffer holds.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let start = Self::minimum_packet_size() + ipv4_options_length(self);
        self.buf.as_slice().get(start..).unwrap_or_default()
    }
}

fn check_size(len: usize) -> Result<()> {
    if len >= Ipv4Packet::minimum_packet_size() {
        Ok(())
    } else {
        Err(Error::InsufficientPacketBuffer(
            String::from("Ipv4Packet"),
            Ipv4Packet::minimum_packet_size(),
            len,
        ))
    }
}

fn ipv4_options_length(ipv4: &Ipv4Packet<'_>) -> usize {
    (ipv4.get_header_length() as usize * 4).saturating_sub(Ipv4Packet::minimum_packet_size())
}

impl Debug for Ipv4Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Packet")
            .field("version", &self.get_version())
            .field("header_length", &self.get_header_length())
            .field("tos", &self.get_tos())
            .field("total_length", &self.get_total_length())
            .field("identification", &self.get_identification())
            .field(
                "flags_and_fragment_offset",
                &self.get_flags_and_fragment_offset(),
            )
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &self.get_checksum())
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("options_raw", &self.get_options_raw())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

/// An owned `IPv4` header, as exchanged by raw datagram connections.
///
/// `header_length` and `total_length` are in bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Ipv4Header {
    pub version: u8,
    pub header_length: usize,
    pub tos: u8,
    pub total_length: usize,
    pub identification: u16,
    /// The 3 flag bits, e.g. `0b010` for don't fragment.
    pub flags: u8,
    /// The fragment offset in units of 8 bytes.
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub options: Vec<u8>,
}

impl Ipv4Header {
    /// The don't fragment flag.
    pub const DONT_FRAGMENT: u8 = 0b010;

    /// The more fragments flag.
    pub const MORE_FRAGMENTS: u8 = 0b001;

    /// Build a header without options for a payload of `payload_len` bytes.
    ///
    /// The source is left unspecified so the kernel may fill it in.
    #[must_use]
    pub fn for_payload(
        protocol: IpProtocol,
        destination: Ipv4Addr,
        ttl: u8,
        payload_len: usize,
    ) -> Self {
        Self {
            version: 4,
            header_length: Ipv4Packet::minimum_packet_size(),
            tos: 0,
            total_length: Ipv4Packet::minimum_packet_size() + payload_len,
            identification: 0,
            flags: 0,
            fragment_offset: 0,
            ttl,
            protocol,
            checksum: 0,
            source: Ipv4Addr::UNSPECIFIED,
            destination,
            options: Vec::new(),
        }
    }

    /// Return a copy of this header carrying a freshly computed header checksum.
    pub fn with_checksum(mut self) -> Result<Self> {
        let bytes = self.marshal()?;
        self.checksum = ipv4_header_checksum(&bytes);
        Ok(self)
    }

    /// Check the header fields are consistent with each other.
    pub fn validate(&self) -> Result<()> {
        if self.version != 4 {
            return Err(invalid(format!("version {} is not 4", self.version)));
        }
        if self.header_length < Ipv4Packet::minimum_packet_size()
            || self.header_length > MAX_HEADER_LENGTH
            || self.header_length % 4 != 0
        {
            return Err(invalid(format!(
                "header length {} out of range",
                self.header_length
            )));
        }
        if self.options.len() != self.header_length - Ipv4Packet::minimum_packet_size() {
            return Err(invalid(format!(
                "options length {} does not match header length {}",
                self.options.len(),
                self.header_length
            )));
        }
        if self.header_length > self.total_length {
            return Err(invalid(format!(
                "header length {} exceeds total length {}",
                self.header_length, self.total_length
            )));
        }
        if self.total_length > usize::from(u16::MAX) {
            return Err(invalid(format!(
                "total length {} out of range",
                self.total_length
            )));
        }
        if self.flags > 0b111 || self.fragment_offset > 0x1fff {
            return Err(invalid(String::from("flags or fragment offset out of range")));
        }
        Ok(())
    }

    /// Marshal the header (including options) to wire bytes in network byte order.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = vec![0_u8; self.header_length];
        let mut ipv4 = Ipv4Packet::new(&mut buf)?;
        ipv4.set_version(self.version);
        ipv4.set_header_length((self.header_length / 4) as u8);
        ipv4.set_tos(self.tos);
        ipv4.set_total_length(self.total_length as u16);
        ipv4.set_identification(self.identification);
        ipv4.set_flags_and_fragment_offset(
            (u16::from(self.flags) << 13) | (self.fragment_offset & 0x1fff),
        );
        ipv4.set_ttl(self.ttl);
        ipv4.set_protocol(self.protocol);
        ipv4.set_checksum(self.checksum);
        ipv4.set_source(self.source);
        ipv4.set_destination(self.destination);
        ipv4.set_options_raw(&self.options);
        Ok(buf)
    }

    /// Parse a header from the start of `bytes`.
    ///
    /// The total length is taken as found; it is not checked against `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Ipv4Packet::minimum_packet_size() {
            return Err(Error::TruncatedMessage(
                Ipv4Packet::minimum_packet_size(),
                bytes.len(),
            ));
        }
        let ipv4 = Ipv4Packet::new_view(bytes)?;
        let header_length = usize::from(ipv4.get_header_length()) * 4;
        if header_length < Ipv4Packet::minimum_packet_size() || header_length > bytes.len() {
            return Err(invalid(format!(
                "header length {header_length} invalid for {} bytes",
                bytes.len()
            )));
        }
        let flags_and_offset = ipv4.get_flags_and_fragment_offset();
        Ok(Self {
            version: ipv4.get_version(),
            header_length,
            tos: ipv4.get_tos(),
            total_length: usize::from(ipv4.get_total_length()),
            identification: ipv4.get_identification(),
            flags: (flags_and_offset >> 13) as u8,
            fragment_offset: flags_and_offset & 0x1fff,
            ttl: ipv4.get_ttl(),
            protocol: ipv4.get_protocol(),
            checksum: ipv4.get_checksum(),
            source: ipv4.get_source(),
            destination: ipv4.get_destination(),
            options: ipv4.get_options_raw().to_vec(),
        })
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidHeader(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_version_and_header_length() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        packet.set_header_length(5);
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!([0x45], packet.packet()[..1]);
        packet.set_header_length(15);
        assert_eq!(4, packet.get_version());
        assert_eq!([0x4F], packet.packet()[..1]);
    }

    #[test]
    fn test_fields() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_total_length(84);
        packet.set_flags_and_fragment_offset(0x4000);
        packet.set_ttl(u8::MAX);
        packet.set_protocol(IpProtocol::Icmp);
        packet.set_source(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(84, packet.get_total_length());
        assert_eq!([0x00, 0x54], packet.packet()[2..=3]);
        assert_eq!([0x40, 0x00], packet.packet()[6..=7]);
        assert_eq!(u8::MAX, packet.get_ttl());
        assert_eq!(IpProtocol::Icmp, packet.get_protocol());
        assert_eq!([10, 0, 0, 1], packet.packet()[12..16]);
    }

    #[test]
    fn test_view() {
        let buf = hex!(
            "
            45 00 00 1c 00 00 40 00 0a 01 00 00 01 02 03 04
            05 06 07 08 08 00 70 93 04 d2 82 9a
            "
        );
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!(28, packet.get_total_length());
        assert_eq!(10, packet.get_ttl());
        assert_eq!(IpProtocol::Icmp, packet.get_protocol());
        assert_eq!(Ipv4Addr::new(1, 2, 3, 4), packet.get_source());
        assert_eq!(Ipv4Addr::new(5, 6, 7, 8), packet.get_destination());
        assert!(packet.get_options_raw().is_empty());
        assert_eq!(&hex!("08 00 70 93 04 d2 82 9a"), packet.payload());
    }

    #[test]
    fn test_payload_with_bogus_header_length() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        buf[0] = 0x4f;
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_new_view_insufficient_buffer() {
        let buf = [0_u8; 19];
        let err = Ipv4Packet::new_view(&buf).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("Ipv4Packet"), 20, 19),
            err
        );
    }

    #[test]
    fn test_header_marshal() -> anyhow::Result<()> {
        let mut header =
            Ipv4Header::for_payload(IpProtocol::Icmp, Ipv4Addr::new(5, 6, 7, 8), 10, 8);
        header.source = Ipv4Addr::new(1, 2, 3, 4);
        header.flags = Ipv4Header::DONT_FRAGMENT;
        let bytes = header.marshal()?;
        assert_eq!(
            hex!("45 00 00 1c 00 00 40 00 0a 01 00 00 01 02 03 04 05 06 07 08"),
            bytes.as_slice()
        );
        Ok(())
    }

    #[test]
    fn test_header_with_checksum() -> anyhow::Result<()> {
        let header = Ipv4Header {
            total_length: 4092,
            identification: 0x38c0,
            ttl: 64,
            source: Ipv4Addr::new(10, 0, 0, 2),
            ..Ipv4Header::for_payload(IpProtocol::Icmp, Ipv4Addr::new(10, 0, 0, 1), 64, 0)
        }
        .with_checksum()?;
        assert_eq!(0x1e3f, header.checksum);
        Ok(())
    }

    #[test]
    fn test_header_parse_round_trip() -> anyhow::Result<()> {
        let header = Ipv4Header {
            header_length: 24,
            total_length: 32,
            tos: 0xb8,
            identification: 7,
            flags: Ipv4Header::MORE_FRAGMENTS,
            fragment_offset: 185,
            options: vec![0x01, 0x01, 0x01, 0x00],
            ..Ipv4Header::for_payload(IpProtocol::Udp, Ipv4Addr::LOCALHOST, 1, 8)
        };
        let parsed = Ipv4Header::parse(&header.marshal()?)?;
        assert_eq!(header, parsed);
        Ok(())
    }

    #[test]
    fn test_header_length_exceeds_total_length() {
        let header = Ipv4Header {
            total_length: 10,
            ..Ipv4Header::for_payload(IpProtocol::Icmp, Ipv4Addr::LOCALHOST, 64, 0)
        };
        assert!(matches!(header.marshal(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_options_mismatch() {
        let header = Ipv4Header {
            options: vec![0x01],
            ..Ipv4Header::for_payload(IpProtocol::Icmp, Ipv4Addr::LOCALHOST, 64, 0)
        };
        assert!(matches!(header.validate(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_bad_version() {
        let header = Ipv4Header {
            version: 6,
            ..Ipv4Header::for_payload(IpProtocol::Icmp, Ipv4Addr::LOCALHOST, 64, 0)
        };
        assert!(matches!(header.validate(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_parse_truncated() {
        let err = Ipv4Header::parse(&[0x45; 12]).unwrap_err();
        assert_eq!(Error::TruncatedMessage(20, 12), err);
    }

    #[test]
    fn test_header_parse_header_length_too_large() {
        let mut buf = [0_u8; 20];
        buf[0] = 0x46;
        assert!(matches!(
            Ipv4Header::parse(&buf),
            Err(Error::InvalidHeader(_))
        ));
    }
}
