/// The byte order to encode the `total_length`, `flags` and `fragment_offset` fields of the IPv4
/// header.
///
/// To quote directly from the `mtr` source code (from `check_length_order` in `probe_unix.c`):
///
/// "Nearly all fields in the IP header should be encoded in network byte
/// order prior to passing to `send()`.  However, the required byte order of
/// the length field of the IP header is inconsistent between operating
/// systems and operating system versions.  FreeBSD 11 requires the length
/// field in network byte order, but some older versions of FreeBSD
/// require host byte order.  OS X requires the length field in host
/// byte order.  Linux will accept either byte order."
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Ipv4ByteOrder {
    Host,
    Network,
}

impl Ipv4ByteOrder {
    /// The byte order raw sockets on this platform expect.
    #[must_use]
    pub const fn for_platform() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Host
        } else {
            Self::Network
        }
    }

    /// Convert the length and fragment fields of a marshaled header between network byte order
    /// and this byte order.
    ///
    /// The conversion is its own inverse and so applies in both directions. A buffer shorter
    /// than a minimal header is left unchanged.
    pub fn convert(self, header: &mut [u8]) {
        if self == Self::Host
            && cfg!(target_endian = "little")
            && header.len() >= rawnet_packet::ipv4::Ipv4Packet::minimum_packet_size()
        {
            header.swap(2, 3);
            header.swap(6, 7);
        }
    }
}
