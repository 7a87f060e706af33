//! The Internet checksum (RFC 1071) as used by `ICMPv4` and the `IPv4` header.
//!
//! This code is derived from [`libpnet`] which is available under the Apache 2.0 license.
//!
//! [`libpnet`]: https://github.com/libpnet/libpnet

/// Index of the checksum word within an `ICMP` message.
const ICMP_CHECKSUM_WORD: usize = 1;

/// Index of the checksum word within an `IPv4` header.
const IPV4_CHECKSUM_WORD: usize = 5;

/// Calculate the checksum for an `Ipv4` header.
///
/// The checksum field of `data` is skipped.
#[must_use]
pub fn ipv4_header_checksum(data: &[u8]) -> u16 {
    checksum(data, Some(IPV4_CHECKSUM_WORD))
}

/// Calculate the checksum for an `Ipv4` `ICMP` message.
///
/// The checksum field of `data` is skipped.
#[must_use]
pub fn icmp_ipv4_checksum(data: &[u8]) -> u16 {
    checksum(data, Some(ICMP_CHECKSUM_WORD))
}

/// Calculate the Internet checksum over every word of `data`.
///
/// A message that carries a correct checksum sums to zero.
#[must_use]
pub fn internet_checksum(data: &[u8]) -> u16 {
    checksum(data, None)
}

fn checksum(data: &[u8], ignore_word: Option<usize>) -> u16 {
    if data.is_empty() {
        return 0;
    }
    finalize_checksum(sum_be_words(data, ignore_word))
}

fn sum_be_words(data: &[u8], ignore_word: Option<usize>) -> u32 {
    let mut words = data.chunks_exact(2);
    let mut sum = words
        .by_ref()
        .enumerate()
        .filter(|&(i, _)| Some(i) != ignore_word)
        .map(|(_, word)| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .fold(0u32, |acc, word| fold_carry(acc + word));
    if let [last] = words.remainder() {
        if Some(data.len() / 2) != ignore_word {
            sum = fold_carry(sum + (u32::from(*last) << 8));
        }
    }
    sum
}

/// Fold any carry above 16 bits back into the low word.
const fn fold_carry(sum: u32) -> u32 {
    (sum >> 16) + (sum & 0xFFFF)
}

const fn finalize_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = fold_carry(sum);
    }
    !sum as u16
}
