//! Wire representations of the protocol headers.
//!
//! Each format is a `repr(transparent)` wrapper over a byte slice with
//! accessor methods for the individual fields. Parsing never copies; a
//! checked constructor validates the length once, after which field
//! access cannot panic.

use core::fmt;

mod arp;
pub mod checksum;
mod ethernet;
mod icmpv4;
mod icmpv6;
mod ip;
mod ipv4;
mod ipv6;
mod tcp;
mod udp;

pub use self::arp::{
    arp as arp_packet,
    Operation as ArpOperation,
    PACKET_LEN as ARP_PACKET_LEN,
};
pub use self::ethernet::{
    ethernet as ethernet_frame,
    Address as EthernetAddress, EtherType,
    HEADER_LEN as ETHERNET_HEADER_LEN,
};
pub use self::icmpv4::{
    icmpv4 as icmpv4_packet,
    Message as Icmpv4Message,
    HEADER_LEN as ICMPV4_HEADER_LEN, UNREACHABLE_PORT,
};
pub use self::icmpv6::{
    icmpv6 as icmpv6_packet,
    Message as Icmpv6Message,
    NA_FLAG_OVERRIDE, NA_FLAG_SOLICITED,
    ND_MSG_LEN, ND_OPT_LLADDR_LEN,
    OPT_SOURCE_LLADDR, OPT_TARGET_LLADDR,
};
pub use self::ip::{Address as IpAddress, Protocol as IpProtocol};
pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    HEADER_LEN as IPV4_HEADER_LEN,
};
pub use self::ipv6::{
    ipv6 as ipv6_packet,
    Address as Ipv6Address,
    HEADER_LEN as IPV6_HEADER_LEN,
};
pub use self::tcp::{
    tcp as tcp_packet,
    Flags as TcpFlags, SeqNumber as TcpSeqNumber,
    HEADER_LEN as TCP_HEADER_LEN,
};
pub use self::udp::{
    udp as udp_packet,
    HEADER_LEN as UDP_HEADER_LEN,
};

mod field {
    pub(crate) type Field = core::ops::Range<usize>;
    pub(crate) type Rest = core::ops::RangeFrom<usize>;
}

/// A parsing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is too short to contain the claimed structure.
    Truncated,
    /// A field value contradicts the format.
    Malformed,
}

/// The result of a parsing operation.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated packet"),
            Error::Malformed => write!(f, "malformed packet"),
        }
    }
}
