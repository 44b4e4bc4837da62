use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};
use super::ip::Protocol;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// The unspecified address `0.0.0.0`.
    pub const UNSPECIFIED: Address = Address([0; 4]);

    /// The limited broadcast address `255.255.255.255`.
    pub const BROADCAST: Address = Address([0xff; 4]);

    /// Construct an address from octets.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an address from a four-octet slice.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return the address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is `0.0.0.0`.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address is the limited broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the address is in the multicast range.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 0xe0
    }

    /// Best-effort test for a directed broadcast.
    ///
    /// Without the subnet mask the stack cannot decide this precisely; a
    /// host part of all ones in the last octet is treated as broadcast.
    pub fn looks_like_broadcast(&self) -> bool {
        self.is_broadcast() || self.0[3] == 0xff
    }

    /// Check whether this address agrees with `other` in the first
    /// `prefix_len` bits.
    pub fn matches_prefix(&self, other: Address, prefix_len: u8) -> bool {
        if prefix_len > 32 {
            return false;
        }
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
        let own = NetworkEndian::read_u32(self.as_bytes());
        let net = NetworkEndian::read_u32(other.as_bytes());
        (own ^ net) & mask == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const VER_IHL:  usize =  0;
    pub(crate) const TOTAL_LEN: Field = 2..4;
    pub(crate) const TTL:      usize =  8;
    pub(crate) const PROTOCOL: usize =  9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// The length of a header without options.
pub const HEADER_LEN: usize = 20;

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Wrap a buffer after checking it holds a complete base header.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Wrap a mutable buffer after checking it holds a complete base header.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length in bytes, decoded from the IHL field.
    pub fn header_len(&self) -> usize {
        usize::from(self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the total length field.
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::TOTAL_LEN])
    }

    /// Return the time-to-live field.
    pub fn ttl(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Set the version and IHL fields for an optionless header.
    pub fn set_ver_ihl_basic(&mut self) {
        self.0[field::VER_IHL] = 0x45;
    }

    /// Set the total length field.
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::TOTAL_LEN], value)
    }

    /// Set the time-to-live field.
    pub fn set_ttl(&mut self, value: u8) {
        self.0[field::TTL] = value;
    }

    /// Set the protocol field.
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into();
    }

    /// Set the header checksum field.
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Recompute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let sum = {
            let header = &self.0[..self.header_len().max(HEADER_LEN)];
            super::checksum::data(0, header)
        };
        self.set_checksum(!sum);
    }

    /// Verify the header checksum.
    pub fn verify_checksum(&self) -> bool {
        let len = self.header_len();
        if len < HEADER_LEN || len > self.0.len() {
            return false;
        }
        super::checksum::data(0, &self.0[..len]) == 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PACKET: [u8; 24] = [
        0x45, 0x00, 0x00, 0x18,
        0x00, 0x00, 0x40, 0x00,
        0x40, 0x11, 0x00, 0x00,
        0x0a, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00, 0x02,
        0xaa, 0xbb, 0xcc, 0xdd,
    ];

    #[test]
    fn deconstruct() {
        let packet = ipv4::new_checked(&PACKET[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 24);
        assert_eq!(packet.ttl(), 64);
        assert_eq!(packet.protocol(), Protocol::Udp);
        assert_eq!(packet.src_addr(), Address::new(10, 0, 0, 1));
        assert_eq!(packet.dst_addr(), Address::new(10, 0, 0, 2));
    }

    #[test]
    fn checksum_round() {
        let mut bytes = PACKET;
        {
            let packet = ipv4::new_unchecked_mut(&mut bytes[..]);
            packet.fill_checksum();
        }
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert!(packet.verify_checksum());
    }

    #[test]
    fn broadcast_heuristic() {
        assert!(Address::BROADCAST.looks_like_broadcast());
        assert!(Address::new(10, 0, 0, 255).looks_like_broadcast());
        assert!(!Address::new(10, 0, 0, 2).looks_like_broadcast());
    }

    #[test]
    fn prefix_match() {
        let net = Address::new(10, 0, 0, 0);
        assert!(Address::new(10, 0, 0, 77).matches_prefix(net, 24));
        assert!(!Address::new(10, 0, 1, 77).matches_prefix(net, 24));
        assert!(Address::new(192, 168, 1, 1).matches_prefix(net, 0));
    }
}
