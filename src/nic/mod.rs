//! The network device interface.
//!
//! A [`Device`] owns one link and the addresses configured on it. The
//! protocol layers drive it through dynamic dispatch so that a stack
//! instance can be assembled over any link implementation.

use crate::wire::{EtherType, EthernetAddress, Ipv4Address, Ipv6Address};

#[cfg(any(feature = "std", test))]
mod loopback;

#[cfg(any(feature = "std", test))]
pub use self::loopback::Loopback;

/// An error raised by a device on transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The frame does not fit or no transmit resources are available.
    Exhausted,
}

/// The result of a device operation.
pub type Result<T> = core::result::Result<T, Error>;

/// One attached network interface.
///
/// `send` assembles an Ethernet frame from scattered payload segments;
/// `send_raw` transmits a frame that is already complete, which the
/// receive path uses to turn a request buffer into its reply in place.
pub trait Device {
    /// The hardware address of this interface.
    fn link_addr(&self) -> EthernetAddress;

    /// The configured IPv4 address, or the unspecified address.
    fn ipv4_addr(&self) -> Ipv4Address;

    /// The link-local IPv6 address derived from the hardware address.
    fn ipv6_link_local(&self) -> Ipv6Address;

    /// The configured global IPv6 address, if any.
    fn ipv6_global(&self) -> Option<Ipv6Address>;

    /// The maximum transmission unit of the link, in payload bytes.
    fn mtu(&self) -> usize;

    /// Transmit one frame built from header fields and payload segments.
    ///
    /// The device writes the Ethernet header with its own address as the
    /// source, then the segments of `chunks` in order.
    fn send(
        &mut self,
        dst: EthernetAddress,
        ethertype: EtherType,
        chunks: &[&[u8]],
    ) -> Result<()>;

    /// Transmit one complete frame, Ethernet header included.
    fn send_raw(&mut self, frame: &[u8]) -> Result<()>;
}
