//! The protocol layer implementations.
//!
//! Receive processing is driven through a [`Context`] that accumulates
//! what each layer learned about the frame while keeping every table and
//! the device borrowed disjointly, so a handler deep in the stack can
//! still transmit. Replies reuse the receive buffer wherever the reply
//! is no longer than the request.

use core::fmt;

use crate::nic;
use crate::wire::{self, ethernet_frame, EthernetAddress, IpAddress};

pub mod arp;
pub mod eth;
pub mod icmp;
pub mod icmpv6;
pub mod ipv4;
pub mod ipv6;
pub mod ndp;
pub mod route;
pub mod tcp;
pub mod udp;

/// An error from a protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A buffer is shorter than a length field claims.
    Truncated,
    /// A header field contradicts the protocol.
    Malformed,
    /// The frame is valid but no handler exists for it.
    Unrecognized,
    /// No route covers the destination.
    Unreachable,
    /// The next hop has no known link address yet.
    Unresolved,
    /// A fixed size table or buffer is full.
    Exhausted,
    /// The operation cannot proceed right now; retry after progress.
    Busy,
    /// The referenced connection no longer exists.
    BadHandle,
    /// The remote end refused or reset the connection.
    Refused,
}

/// The result of a protocol operation.
pub type Result<T> = core::result::Result<T, Error>;

impl From<wire::Error> for Error {
    fn from(error: wire::Error) -> Error {
        match error {
            wire::Error::Truncated => Error::Truncated,
            wire::Error::Malformed => Error::Malformed,
        }
    }
}

impl From<nic::Error> for Error {
    fn from(error: nic::Error) -> Error {
        match error {
            nic::Error::Exhausted => Error::Exhausted,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated    => write!(f, "truncated"),
            Error::Malformed    => write!(f, "malformed"),
            Error::Unrecognized => write!(f, "unrecognized"),
            Error::Unreachable  => write!(f, "no route"),
            Error::Unresolved   => write!(f, "link address unresolved"),
            Error::Exhausted    => write!(f, "out of space"),
            Error::Busy         => write!(f, "busy"),
            Error::BadHandle    => write!(f, "stale handle"),
            Error::Refused      => write!(f, "connection refused"),
        }
    }
}

/// Everything known about the frame currently being processed.
///
/// Layers fill in their part while parsing downwards: the link layer
/// records the addresses and where the network header starts, the
/// network layer the IP addresses and where the transport header
/// starts, and so on. Offsets index into `frame`; `len` is the valid
/// prefix and shrinks as length fields narrow it down.
pub struct Context<'a, 'e> {
    pub dev: &'a mut dyn nic::Device,
    pub arp: &'a mut arp::Cache<'e>,
    pub ndp: &'a mut ndp::Cache<'e>,
    pub routes: &'a mut route::Routes<'e>,
    pub udp: &'a mut udp::Binds<'e>,
    pub tcp: &'a mut tcp::Endpoint<'e>,

    /// The full receive buffer; may be longer than the frame.
    pub frame: &'a mut [u8],
    /// Length of the valid data within `frame`.
    pub len: usize,

    pub src_mac: EthernetAddress,
    pub dst_mac: EthernetAddress,
    /// Offset of the network layer header.
    pub l3_start: usize,
    pub src_addr: IpAddress,
    pub dst_addr: IpAddress,
    /// Offset of the transport layer header.
    pub l4_start: usize,
    pub src_port: u16,
    pub dst_port: u16,
}

/// The tables an outbound transmission needs, without a received frame.
///
/// Borrowed out of whatever owns the stack state, usually [`crate::stack::Stack`].
pub struct SendContext<'a, 'e> {
    pub dev: &'a mut dyn nic::Device,
    pub arp: &'a mut arp::Cache<'e>,
    pub ndp: &'a mut ndp::Cache<'e>,
    pub routes: &'a mut route::Routes<'e>,
}

impl<'a, 'e> Context<'a, 'e> {
    /// Turn the buffer into a reply frame and transmit it.
    ///
    /// The link layer addresses are rewritten, everything above must
    /// already have been rewritten in place by the caller.
    pub fn reply(&mut self) -> Result<()> {
        let link_addr = self.dev.link_addr();
        {
            let frame = ethernet_frame::new_checked_mut(&mut self.frame[..self.len])?;
            frame.set_dst_addr(self.src_mac);
            frame.set_src_addr(link_addr);
        }
        self.dev.send_raw(&self.frame[..self.len])?;
        Ok(())
    }
}
