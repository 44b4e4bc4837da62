use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};
use super::ip::Protocol;

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 16]);

impl Address {
    /// The unspecified address `::`.
    pub const UNSPECIFIED: Address = Address([0; 16]);

    /// Construct an address from a sixteen-octet slice.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Construct a link-local address from an interface identifier.
    ///
    /// Builds `fe80::/64` with the eight `iid` octets as the low half,
    /// the way a device derives its own link-local address from its
    /// hardware address.
    pub fn link_local_from_iid(iid: [u8; 8]) -> Address {
        let mut bytes = [0; 16];
        bytes[0] = 0xfe;
        bytes[1] = 0x80;
        bytes[8..].copy_from_slice(&iid);
        Address(bytes)
    }

    /// Return the address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is `::`.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address is in `fe80::/10`.
    pub fn is_link_local(&self) -> bool {
        self.0[0] == 0xfe && self.0[1] & 0xc0 == 0x80
    }

    /// Query whether the address is in `ff00::/8`.
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Check whether this address agrees with `other` in the first
    /// `prefix_len` bits.
    pub fn matches_prefix(&self, other: &Address, prefix_len: u8) -> bool {
        if prefix_len > 128 {
            return false;
        }
        let full_octets = usize::from(prefix_len / 8);
        let rest_bits = prefix_len % 8;
        if self.0[..full_octets] != other.0[..full_octets] {
            return false;
        }
        if rest_bits == 0 {
            return true;
        }
        let mask = !(0xffu8 >> rest_bits);
        (self.0[full_octets] ^ other.0[full_octets]) & mask == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, pair) in self.0.chunks(2).enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{:x}", NetworkEndian::read_u16(pair))?;
        }
        Ok(())
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv6 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv6([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const VER_TC_FLOW: Field =  0..4;
    pub(crate) const PAYLOAD_LEN: Field =  4..6;
    pub(crate) const NEXT_HEADER: usize =  6;
    pub(crate) const HOP_LIMIT:   usize =  7;
    pub(crate) const SRC_ADDR:    Field =  8..24;
    pub(crate) const DST_ADDR:    Field = 24..40;
}

/// The fixed header length; extension headers are not supported.
pub const HEADER_LEN: usize = 40;

impl ipv6 {
    /// Imbue a raw octet buffer with IPv6 packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with IPv6 packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Wrap a buffer after checking it holds a complete header.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Wrap a mutable buffer after checking it holds a complete header.
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
        self.0[0] >> 4
    }

    /// Set version 6, traffic class and flow label zero.
    pub fn set_ver_tc_flow_basic(&mut self) {
        NetworkEndian::write_u32(&mut self.0[field::VER_TC_FLOW], 0x6000_0000);
    }

    /// Return the payload length field.
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::PAYLOAD_LEN])
    }

    /// Set the payload length field.
    pub fn set_payload_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::PAYLOAD_LEN], value)
    }

    /// Return the next header field.
    pub fn next_header(&self) -> Protocol {
        Protocol::from(self.0[field::NEXT_HEADER])
    }

    /// Set the next header field.
    pub fn set_next_header(&mut self, value: Protocol) {
        self.0[field::NEXT_HEADER] = value.into();
    }

    /// Return the hop limit field.
    pub fn hop_limit(&self) -> u8 {
        self.0[field::HOP_LIMIT]
    }

    /// Set the hop limit field.
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::HOP_LIMIT] = value;
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_classes() {
        let ll = Address::link_local_from_iid([0, 0, 0, 0xff, 0xfe, 0, 0, 1]);
        assert!(ll.is_link_local());
        assert!(!ll.is_multicast());

        let mcast = Address::from_bytes(&[
            0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        ]);
        assert!(mcast.is_multicast());
        assert!(!mcast.is_link_local());
    }

    #[test]
    fn header_fields() {
        let mut bytes = [0u8; 40];
        {
            let packet = ipv6::new_checked_mut(&mut bytes[..]).unwrap();
            packet.set_ver_tc_flow_basic();
            packet.set_payload_len(8);
            packet.set_next_header(Protocol::Udp);
            packet.set_hop_limit(64);
        }
        let packet = ipv6::new_unchecked(&bytes[..]);
        assert_eq!(packet.version(), 6);
        assert_eq!(packet.payload_len(), 8);
        assert_eq!(packet.next_header(), Protocol::Udp);
        assert_eq!(packet.hop_limit(), 64);
    }
}
