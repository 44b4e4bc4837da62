use core::fmt;

use super::ipv4::Address as Ipv4Address;
use super::ipv6::Address as Ipv6Address;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp   = 0x01,
        Tcp    = 0x06,
        Udp    = 0x11,
        Icmpv6 = 0x3a,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Icmpv6      => write!(f, "ICMPv6"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id),
        }
    }
}

/// An internetworking address, IPv4 or IPv6.
///
/// The per-frame context carries one of these for the parsed source and
/// destination so that the transport layers can stay address family
/// agnostic.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Address {
    /// Not (yet) parsed or assigned.
    Unspecified,
    /// An IPv4 address.
    Ipv4(Ipv4Address),
    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

impl Default for Address {
    fn default() -> Self {
        Address::Unspecified
    }
}

impl From<Ipv4Address> for Address {
    fn from(addr: Ipv4Address) -> Self {
        Address::Ipv4(addr)
    }
}

impl From<Ipv6Address> for Address {
    fn from(addr: Ipv6Address) -> Self {
        Address::Ipv6(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Unspecified => write!(f, "*"),
            Address::Ipv4(addr) => write!(f, "{}", addr),
            Address::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}
