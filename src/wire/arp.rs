use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};
use super::ethernet::Address as EthernetAddress;
use super::ipv4::Address as Ipv4Address;

enum_with_unknown! {
    /// ARP operation type.
    pub enum Operation(u16) {
        Request = 1,
        Reply   = 2,
    }
}

byte_wrapper! {
    /// A byte sequence representing an ARP packet for IPv4 over Ethernet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct arp([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const HTYPE: Field =  0..2;
    pub(crate) const PTYPE: Field =  2..4;
    pub(crate) const HLEN:  usize =  4;
    pub(crate) const PLEN:  usize =  5;
    pub(crate) const OPER:  Field =  6..8;
    pub(crate) const SHA:   Field =  8..14;
    pub(crate) const SPA:   Field = 14..18;
    pub(crate) const THA:   Field = 18..24;
    pub(crate) const TPA:   Field = 24..28;
}

/// The length of a packet; only Ethernet/IPv4 packets are handled.
pub const PACKET_LEN: usize = 28;

impl arp {
    /// Imbue a raw octet buffer with ARP packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with ARP packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Wrap a buffer after checking it holds a complete packet.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Wrap a mutable buffer after checking it holds a complete packet.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < PACKET_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Check the hardware and protocol type and length fields.
    pub fn check_types(&self) -> Result<()> {
        let htype = NetworkEndian::read_u16(&self.0[field::HTYPE]);
        let ptype = NetworkEndian::read_u16(&self.0[field::PTYPE]);
        if htype != 1 || ptype != 0x0800 {
            return Err(Error::Malformed);
        }
        if self.0[field::HLEN] != 6 || self.0[field::PLEN] != 4 {
            return Err(Error::Malformed);
        }
        Ok(())
    }

    /// Fill in the fixed hardware and protocol type and length fields.
    pub fn set_types_ethernet_ipv4(&mut self) {
        NetworkEndian::write_u16(&mut self.0[field::HTYPE], 1);
        NetworkEndian::write_u16(&mut self.0[field::PTYPE], 0x0800);
        self.0[field::HLEN] = 6;
        self.0[field::PLEN] = 4;
    }

    /// Return the operation field.
    pub fn operation(&self) -> Operation {
        Operation::from(NetworkEndian::read_u16(&self.0[field::OPER]))
    }

    /// Set the operation field.
    pub fn set_operation(&mut self, value: Operation) {
        NetworkEndian::write_u16(&mut self.0[field::OPER], value.into())
    }

    /// Return the sender hardware address field.
    pub fn sender_hardware_addr(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.0[field::SHA])
    }

    /// Set the sender hardware address field.
    pub fn set_sender_hardware_addr(&mut self, value: EthernetAddress) {
        self.0[field::SHA].copy_from_slice(value.as_bytes())
    }

    /// Return the sender protocol address field.
    pub fn sender_protocol_addr(&self) -> Ipv4Address {
        Ipv4Address::from_bytes(&self.0[field::SPA])
    }

    /// Set the sender protocol address field.
    pub fn set_sender_protocol_addr(&mut self, value: Ipv4Address) {
        self.0[field::SPA].copy_from_slice(value.as_bytes())
    }

    /// Return the target hardware address field.
    pub fn target_hardware_addr(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.0[field::THA])
    }

    /// Set the target hardware address field.
    pub fn set_target_hardware_addr(&mut self, value: EthernetAddress) {
        self.0[field::THA].copy_from_slice(value.as_bytes())
    }

    /// Return the target protocol address field.
    pub fn target_protocol_addr(&self) -> Ipv4Address {
        Ipv4Address::from_bytes(&self.0[field::TPA])
    }

    /// Set the target protocol address field.
    pub fn set_target_protocol_addr(&mut self, value: Ipv4Address) {
        self.0[field::TPA].copy_from_slice(value.as_bytes())
    }
}
