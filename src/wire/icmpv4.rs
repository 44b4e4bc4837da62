use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::{Error, Result};

enum_with_unknown! {
    /// ICMPv4 message type.
    pub enum Message(u8) {
        EchoReply       = 0,
        DestUnreachable = 3,
        EchoRequest     = 8,
    }
}

/// Destination unreachable code for a closed port.
pub const UNREACHABLE_PORT: u8 = 3;

byte_wrapper! {
    /// A byte sequence representing an ICMPv4 message.
    #[derive(Debug, PartialEq, Eq)]
    pub struct icmpv4([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const TYPE:     usize = 0;
    pub(crate) const CODE:     usize = 1;
    pub(crate) const CHECKSUM: Field = 2..4;
    pub(crate) const REST:     Field = 4..8;
    pub(crate) const PAYLOAD:  Rest  = 8..;
}

/// The length of the fixed message header.
pub const HEADER_LEN: usize = field::PAYLOAD.start;

impl icmpv4 {
    /// Imbue a raw octet buffer with ICMPv4 message structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with ICMPv4 message structure.
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

    /// Zero the rest-of-header field.
    pub fn clear_rest(&mut self) {
        for byte in &mut self.0[field::REST] {
            *byte = 0;
        }
    }

    /// Recompute and fill in the checksum over the whole message.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let sum = super::checksum::data(0, &self.0);
        self.set_checksum(!sum);
    }

    /// Verify the checksum over the whole message.
    pub fn verify_checksum(&self) -> bool {
        super::checksum::data(0, &self.0) == 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_checksum_round() {
        let mut bytes = [0u8; 16];
        {
            let message = icmpv4::new_checked_mut(&mut bytes[..]).unwrap();
            message.set_msg_type(Message::EchoRequest);
            message.set_msg_code(0);
            message.fill_checksum();
        }
        let message = icmpv4::new_unchecked(&bytes[..]);
        assert_eq!(message.msg_type(), Message::EchoRequest);
        assert!(message.verify_checksum());
    }
}
