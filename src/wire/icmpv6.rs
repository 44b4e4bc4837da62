use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};
use super::ethernet::Address as EthernetAddress;
use super::ipv6::Address as Ipv6Address;

enum_with_unknown! {
    /// ICMPv6 message type.
    pub enum Message(u8) {
        EchoRequest           = 128,
        EchoReply             = 129,
        NeighborSolicitation  = 135,
        NeighborAdvertisement = 136,
    }
}

/// Neighbor advertisement flag: responds to a solicitation.
pub const NA_FLAG_SOLICITED: u8 = 0x40;
/// Neighbor advertisement flag: override an existing cache entry.
pub const NA_FLAG_OVERRIDE: u8 = 0x20;

/// Neighbor discovery option: target link-layer address.
pub const OPT_TARGET_LLADDR: u8 = 2;
/// Neighbor discovery option: source link-layer address.
pub const OPT_SOURCE_LLADDR: u8 = 1;

byte_wrapper! {
    /// A byte sequence representing an ICMPv6 message.
    #[derive(Debug, PartialEq, Eq)]
    pub struct icmpv6([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const TYPE:     usize =  0;
    pub(crate) const CODE:     usize =  1;
    pub(crate) const CHECKSUM: Field =  2..4;
    // neighbor discovery layout
    pub(crate) const ND_FLAGS:   usize =  4;
    pub(crate) const ND_RESERVED: Field = 4..8;
    pub(crate) const ND_TARGET: Field =  8..24;
    pub(crate) const ND_OPTIONS: Rest = 24..;
}

/// The length of the fixed message header.
pub const HEADER_LEN: usize = 8;

/// The length of a neighbor solicitation or advertisement without options.
pub const ND_MSG_LEN: usize = field::ND_OPTIONS.start;

/// The length of a link-layer address option on Ethernet.
pub const ND_OPT_LLADDR_LEN: usize = 8;

impl icmpv6 {
    /// Imbue a raw octet buffer with ICMPv6 message structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with ICMPv6 message structure.
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

    /// Ensure that the fixed header accessors will not panic.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Ensure that the neighbor discovery accessors will not panic.
    pub fn check_nd_len(&self) -> Result<()> {
        if self.0.len() < ND_MSG_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the message type field.
    pub fn msg_type(&self) -> Message {
        Message::from(self.0[field::TYPE])
    }

    /// Set the message type field.
    pub fn set_msg_type(&mut self, value: Message) {
        self.0[field::TYPE] = value.into();
    }

    /// Return the message code field.
    pub fn msg_code(&self) -> u8 {
        self.0[field::CODE]
    }

    /// Set the message code field.
    pub fn set_msg_code(&mut self, value: u8) {
        self.0[field::CODE] = value;
    }

    /// Return the checksum field.
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Set the checksum field.
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Return the neighbor advertisement flags byte.
    pub fn nd_flags(&self) -> u8 {
        self.0[field::ND_FLAGS]
    }

    /// Set the neighbor advertisement flags and zero the reserved bits.
    pub fn set_nd_flags(&mut self, value: u8) {
        for byte in &mut self.0[field::ND_RESERVED] {
            *byte = 0;
        }
        self.0[field::ND_FLAGS] = value;
    }

    /// Return the neighbor discovery target address.
    pub fn nd_target(&self) -> Ipv6Address {
        Ipv6Address::from_bytes(&self.0[field::ND_TARGET])
    }

    /// Set the neighbor discovery target address.
    pub fn set_nd_target(&mut self, value: Ipv6Address) {
        self.0[field::ND_TARGET].copy_from_slice(value.as_bytes())
    }

    /// Scan the neighbor discovery options for a link-layer address.
    pub fn nd_lladdr_option(&self, kind: u8) -> Option<EthernetAddress> {
        let mut options = &self.0[field::ND_OPTIONS.start.min(self.0.len())..];
        while options.len() >= 2 {
            let len = usize::from(options[1]) * 8;
            if len == 0 || len > options.len() {
                return None;
            }
            if options[0] == kind && len == ND_OPT_LLADDR_LEN {
                return Some(EthernetAddress::from_bytes(&options[2..8]));
            }
            options = &options[len..];
        }
        None
    }

    /// Write a target link-layer address option at the start of the
    /// option space.
    pub fn set_nd_target_lladdr_option(&mut self, addr: EthernetAddress) {
        let options = &mut self.0[field::ND_OPTIONS];
        options[0] = OPT_TARGET_LLADDR;
        options[1] = 1;
        options[2..8].copy_from_slice(addr.as_bytes());
    }

    /// Recompute and fill in the checksum.
    ///
    /// `pseudo` is the IPv6 pseudo header sum covering this message.
    pub fn fill_checksum(&mut self, pseudo: u16) {
        self.set_checksum(0);
        let sum = super::checksum::data(pseudo, &self.0);
        self.set_checksum(!sum);
    }

    /// Verify the checksum against a pseudo header sum.
    pub fn verify_checksum(&self, pseudo: u16) -> bool {
        super::checksum::data(pseudo, &self.0) == 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_construct() {
        let mut bytes = [0u8; 32];
        let target = Ipv6Address::link_local_from_iid([0, 0, 0, 0xff, 0xfe, 0, 0, 1]);
        {
            let message = icmpv6::new_unchecked_mut(&mut bytes[..]);
            message.set_msg_type(Message::NeighborAdvertisement);
            message.set_msg_code(0);
            message.set_nd_flags(NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE);
            message.set_nd_target(target);
            message.set_nd_target_lladdr_option(EthernetAddress([2, 0, 0, 0, 0, 1]));
        }
        let message = icmpv6::new_unchecked(&bytes[..]);
        assert_eq!(message.msg_type(), Message::NeighborAdvertisement);
        assert_eq!(message.nd_flags(), 0x60);
        assert_eq!(message.nd_target(), target);
        assert_eq!(message.nd_lladdr_option(OPT_TARGET_LLADDR),
                   Some(EthernetAddress([2, 0, 0, 0, 0, 1])));
        assert_eq!(message.nd_lladdr_option(OPT_SOURCE_LLADDR), None);
    }

    #[test]
    fn option_scan_stops_on_zero_length() {
        let mut bytes = [0u8; 32];
        bytes[24] = OPT_TARGET_LLADDR;
        bytes[25] = 0;
        let message = icmpv6::new_unchecked(&bytes[..]);
        assert_eq!(message.nd_lladdr_option(OPT_TARGET_LLADDR), None);
    }
}
