//! Internet checksum over contiguous or scattered buffers.
//!
//! Every protocol layer folds 16-bit big-endian words into a 32-bit
//! accumulator and reduces it by repeated carry addition (RFC 1071). The
//! defining property here is that an input split into arbitrary segments
//! sums to the same value as the contiguous whole: the accumulator carries
//! the byte parity across segment boundaries, so an odd-length segment
//! does not shift the words of the next one.
//!
//! All results are returned without the final one's complement; the caller
//! negates when writing the field. Checksum fields must be zeroed before
//! summing the buffer that contains them.
use byteorder::{ByteOrder, NetworkEndian};

use super::ip;
use super::ipv4::Address as Ipv4Address;
use super::ipv6::Address as Ipv6Address;

/// A running checksum that may be fed in arbitrary segments.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    sum: u32,
    /// A pending odd high byte from the previous segment.
    odd: Option<u8>,
}

impl Accumulator {
    /// Start a sum from a seed, usually `0` or a pseudo header sum.
    pub fn new(seed: u16) -> Self {
        Accumulator { sum: u32::from(seed), odd: None }
    }

    /// Fold a segment into the sum.
    pub fn push(&mut self, mut data: &[u8]) {
        if data.is_empty() {
            return;
        }

        if let Some(high) = self.odd.take() {
            self.sum += u32::from(u16::from_be_bytes([high, data[0]]));
            data = &data[1..];
        }

        while data.len() >= 2 {
            self.sum += u32::from(NetworkEndian::read_u16(data));
            data = &data[2..];
        }

        if let Some(&last) = data.first() {
            self.odd = Some(last);
        }
    }

    /// Fold a whole segment chain into the sum.
    pub fn push_chunks(&mut self, chunks: &[&[u8]]) {
        for chunk in chunks {
            self.push(chunk);
        }
    }

    /// Reduce to 16 bits by repeated carry addition.
    ///
    /// Not complemented; negate for the wire representation.
    pub fn finish(mut self) -> u16 {
        if let Some(high) = self.odd.take() {
            self.sum += u32::from(u16::from_be_bytes([high, 0]));
        }
        let mut sum = self.sum;
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }
}

/// Sum one contiguous buffer.
pub fn data(seed: u16, data: &[u8]) -> u16 {
    let mut accum = Accumulator::new(seed);
    accum.push(data);
    accum.finish()
}

/// Sum a segment chain.
pub fn chunks(seed: u16, chunks: &[&[u8]]) -> u16 {
    let mut accum = Accumulator::new(seed);
    accum.push_chunks(chunks);
    accum.finish()
}

/// Sum the IPv4 pseudo header for an upper layer protocol.
pub fn pseudo_header_v4(
    src: Ipv4Address,
    dst: Ipv4Address,
    protocol: ip::Protocol,
    length: u16,
) -> u16 {
    let mut rest = [0u8; 4];
    rest[1] = protocol.into();
    NetworkEndian::write_u16(&mut rest[2..4], length);

    let mut accum = Accumulator::new(0);
    accum.push(src.as_bytes());
    accum.push(dst.as_bytes());
    accum.push(&rest);
    accum.finish()
}

/// Sum the IPv6 pseudo header for an upper layer protocol.
pub fn pseudo_header_v6(
    src: &Ipv6Address,
    dst: &Ipv6Address,
    next_header: ip::Protocol,
    length: u32,
) -> u16 {
    let mut rest = [0u8; 8];
    NetworkEndian::write_u32(&mut rest[0..4], length);
    rest[7] = next_header.into();

    let mut accum = Accumulator::new(0);
    accum.push(src.as_bytes());
    accum.push(dst.as_bytes());
    accum.push(&rest);
    accum.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = &[
        0x45, 0x00, 0x00, 0x54, 0x9b, 0x62, 0x40, 0x00,
        0x40, 0x01, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00, 0x02, 0xde,
    ];

    #[test]
    fn splits_agree_with_whole() {
        let whole = data(0, SAMPLE);

        // every split point, including ones that leave odd segments
        for at in 0..=SAMPLE.len() {
            let (a, b) = SAMPLE.split_at(at);
            assert_eq!(chunks(0, &[a, b]), whole, "split at {}", at);
        }

        // byte-at-a-time
        let mut accum = Accumulator::new(0);
        for byte in SAMPLE {
            accum.push(core::slice::from_ref(byte));
        }
        assert_eq!(accum.finish(), whole);
    }

    #[test]
    fn empty_segments_are_neutral() {
        let whole = data(0, SAMPLE);
        let (a, b) = SAMPLE.split_at(7);
        assert_eq!(chunks(0, &[&[], a, &[], b, &[]]), whole);
    }

    #[test]
    fn known_header_sum() {
        // IPv4 header with a correct checksum sums to 0xffff
        let header = [
            0x45u8, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00,
            0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8, 0x00, 0x01,
            0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(data(0, &header), 0xffff);
    }

    #[test]
    fn seed_carries_over() {
        let first = data(0, &SAMPLE[..8]);
        let total = data(first, &SAMPLE[8..]);
        assert_eq!(total, data(0, SAMPLE));
    }
}
