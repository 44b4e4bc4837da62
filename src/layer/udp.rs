//! UDP receive dispatch and datagram emission.
//!
//! Applications attach plain function handlers to ports. A handler runs
//! inside receive processing with the full per-frame context, so it can
//! answer in place through [`reply`] or originate fresh datagrams.

use byteorder::{ByteOrder, NetworkEndian};

use crate::managed::{List, Slice};
use crate::wire::{checksum, udp_packet, IpAddress, IpProtocol, UDP_HEADER_LEN};

use super::{icmp, ipv4, ipv6, Context, Error, Result, SendContext};

/// A port handler.
///
/// Receives the context and the offset of the datagram payload within
/// `ctx.frame`; the payload ends at `ctx.len`.
pub type Handler = fn(&mut Context<'_, '_>, usize) -> Result<()>;

/// One bound port.
#[derive(Clone, Copy)]
pub struct Bind {
    port: u16,
    handler: Handler,
}

impl Default for Bind {
    fn default() -> Self {
        fn ignore(_: &mut Context<'_, '_>, _: usize) -> Result<()> {
            Ok(())
        }
        Bind { port: 0, handler: ignore }
    }
}

impl core::fmt::Debug for Bind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Bind").field("port", &self.port).finish()
    }
}

/// The table of bound ports.
#[derive(Debug)]
pub struct Binds<'e> {
    entries: List<'e, Bind>,
}

impl<'e> Binds<'e> {
    /// Create a table over the given storage.
    pub fn new<C>(entries: C) -> Self
        where C: Into<Slice<'e, Bind>>
    {
        Binds { entries: List::new(entries.into()) }
    }

    /// Attach a handler to a port.
    ///
    /// Binding a port again replaces its handler in place.
    pub fn bind(&mut self, port: u16, handler: Handler) -> Result<()> {
        if port == 0 {
            return Err(Error::Busy);
        }
        for entry in self.entries.iter_mut() {
            if entry.port == port {
                entry.handler = handler;
                return Ok(());
            }
        }
        match self.entries.push() {
            Some(slot) => {
                *slot = Bind { port, handler };
                Ok(())
            }
            None => Err(Error::Exhausted),
        }
    }

    /// Detach whatever is bound to a port.
    pub fn unbind(&mut self, port: u16) {
        for entry in self.entries.iter_mut() {
            if entry.port == port {
                *entry = Bind::default();
            }
        }
    }

    fn lookup(&self, port: u16) -> Option<Handler> {
        self.entries.iter()
            .find(|bind| bind.port == port && bind.port != 0)
            .map(|bind| bind.handler)
    }
}

/// Process a received datagram.
///
/// An IPv4 datagram for a port nobody listens on is answered with an
/// ICMP port unreachable; IPv6 ones are dropped quietly.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let (src_port, dst_port, length, datagram_checksum) = {
        let datagram = udp_packet::new_checked(&ctx.frame[ctx.l4_start..ctx.len])?;
        (
            datagram.src_port(),
            datagram.dst_port(),
            usize::from(datagram.length()),
            datagram.checksum(),
        )
    };

    if length < UDP_HEADER_LEN {
        return Err(Error::Malformed);
    }
    if ctx.l4_start + length > ctx.len {
        return Err(Error::Truncated);
    }
    ctx.len = ctx.l4_start + length;

    let mandatory = matches!(ctx.dst_addr, IpAddress::Ipv6(_));
    if datagram_checksum != 0 || mandatory {
        let pseudo = pseudo_sum(&ctx.src_addr, &ctx.dst_addr, length as u32)?;
        let sum = checksum::data(pseudo, &ctx.frame[ctx.l4_start..ctx.len]);
        if sum != 0xffff {
            net_debug!("udp: bad checksum from {}", ctx.src_addr);
            return Err(Error::Malformed);
        }
    }

    ctx.src_port = src_port;
    ctx.dst_port = dst_port;

    let payload_at = ctx.l4_start + UDP_HEADER_LEN;
    match ctx.udp.lookup(dst_port) {
        Some(handler) => handler(ctx, payload_at),
        None => {
            net_trace!("udp: nothing bound to port {}", dst_port);
            match ctx.dst_addr {
                IpAddress::Ipv4(addr) if !addr.looks_like_broadcast() => {
                    icmp::port_unreachable(ctx)
                }
                _ => Ok(()),
            }
        }
    }
}

/// Turn the received datagram into an answer carrying `payload_len`
/// bytes, which the handler has already written over the old payload.
pub fn reply(ctx: &mut Context, payload_len: usize) -> Result<()> {
    let length = UDP_HEADER_LEN + payload_len;
    ctx.len = ctx.l4_start + length;
    {
        let datagram = udp_packet::new_unchecked_mut(&mut ctx.frame[ctx.l4_start..ctx.len]);
        datagram.set_src_port(ctx.dst_port);
        datagram.set_dst_port(ctx.src_port);
        datagram.set_length(length as u16);
        datagram.set_checksum(0);
    }

    match ctx.dst_addr {
        IpAddress::Ipv4(_) => {
            // the checksum is optional here and the buffer is contiguous
            // anyway, so leave it off
            ipv4::reply(ctx, length)
        }
        IpAddress::Ipv6(_) => {
            let (src, dst) = ipv6::reply_addrs(ctx)?;
            let pseudo = checksum::pseudo_header_v6(
                &src, &dst, IpProtocol::Udp, length as u32);
            let sum = {
                let data = &ctx.frame[ctx.l4_start..ctx.len];
                let mut sum = !checksum::data(pseudo, data);
                if sum == 0 {
                    sum = 0xffff;
                }
                sum
            };
            NetworkEndian::write_u16(
                &mut ctx.frame[ctx.l4_start + 6..ctx.l4_start + 8], sum);
            ipv6::reply(ctx, length)
        }
        IpAddress::Unspecified => Err(Error::Unreachable),
    }
}

/// Send one datagram to `dst`.
pub fn send(
    send: &mut SendContext<'_, '_>,
    dst: IpAddress,
    src_port: u16,
    dst_port: u16,
    payload: &[&[u8]],
) -> Result<()> {
    let length =
        UDP_HEADER_LEN + payload.iter().map(|chunk| chunk.len()).sum::<usize>();
    let mut header = [0u8; UDP_HEADER_LEN];
    {
        let datagram = udp_packet::new_unchecked_mut(&mut header);
        datagram.set_src_port(src_port);
        datagram.set_dst_port(dst_port);
        datagram.set_length(length as u16);
        datagram.set_checksum(0);
    }

    match dst {
        IpAddress::Ipv4(addr) => ipv4::send(
            send.dev, send.arp, send.routes,
            addr, IpProtocol::Udp, &mut header, payload,
        ),
        IpAddress::Ipv6(addr) => ipv6::send(
            send.dev, send.ndp, send.routes,
            &addr, IpProtocol::Udp, &mut header, payload,
        ),
        IpAddress::Unspecified => Err(Error::Unreachable),
    }
}

fn pseudo_sum(src: &IpAddress, dst: &IpAddress, length: u32) -> Result<u16> {
    match (src, dst) {
        (IpAddress::Ipv4(src), IpAddress::Ipv4(dst)) => {
            Ok(checksum::pseudo_header_v4(*src, *dst, IpProtocol::Udp, length as u16))
        }
        (IpAddress::Ipv6(src), IpAddress::Ipv6(dst)) => {
            Ok(checksum::pseudo_header_v6(src, dst, IpProtocol::Udp, length))
        }
        _ => Err(Error::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::testing::{self, handle};
    use crate::wire::{
        ethernet_frame, icmpv4_packet, ipv4_packet, EtherType, Icmpv4Message,
        ETHERNET_HEADER_LEN, IPV4_HEADER_LEN,
    };

    fn datagram_to(port: u16, payload: &[u8]) -> Vec<u8> {
        let l4_len = UDP_HEADER_LEN + payload.len();
        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + l4_len];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(testing::MAC);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Ipv4);
        }
        {
            let packet =
                ipv4_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_ver_ihl_basic();
            packet.set_total_len((IPV4_HEADER_LEN + l4_len) as u16);
            packet.set_ttl(64);
            packet.set_protocol(IpProtocol::Udp);
            packet.set_src_addr(testing::PEER_IP);
            packet.set_dst_addr(testing::IP);
            packet.fill_checksum();
        }
        {
            let at = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
            frame[at + UDP_HEADER_LEN..].copy_from_slice(payload);
            let datagram = udp_packet::new_unchecked_mut(&mut frame[at..]);
            datagram.set_src_port(4000);
            datagram.set_dst_port(port);
            datagram.set_length(l4_len as u16);
            datagram.set_checksum(0);
        }
        frame
    }

    fn echo(ctx: &mut Context<'_, '_>, payload_at: usize) -> Result<()> {
        let len = ctx.len - payload_at;
        reply(ctx, len)
    }

    #[test]
    fn bound_port_echoes() {
        let mut stack = testing::stack();
        stack.udp_bind(7, echo).unwrap();

        let mut frame = datagram_to(7, b"hello");
        handle(&mut stack, &mut frame).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let reply = &sent[0];
        let at = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
        let datagram = udp_packet::new_checked(&reply[at..]).unwrap();
        assert_eq!(datagram.src_port(), 7);
        assert_eq!(datagram.dst_port(), 4000);
        assert_eq!(datagram.payload_slice(), b"hello");
    }

    #[test]
    fn unbound_port_is_unreachable() {
        let mut stack = testing::stack();
        // the reply needs the peer's link address
        stack.arp_mut().learn(testing::PEER_IP, testing::PEER_MAC);

        let mut frame = datagram_to(9, b"anyone there?");
        handle(&mut stack, &mut frame).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let error = &sent[0];
        let packet = ipv4_packet::new_checked(&error[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.protocol(), IpProtocol::Icmp);
        assert_eq!(packet.dst_addr(), testing::PEER_IP);

        let at = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
        let message = icmpv4_packet::new_checked(&error[at..]).unwrap();
        assert_eq!(message.msg_type(), Icmpv4Message::DestUnreachable);
        assert_eq!(message.msg_code(), 3);
        assert!(message.verify_checksum());

        // the message cites the offending IP header plus eight octets
        let cited = &error[at + 8..];
        let original = &frame[ETHERNET_HEADER_LEN..];
        assert_eq!(cited.len(), IPV4_HEADER_LEN + 8);
        assert_eq!(cited[..IPV4_HEADER_LEN], original[..IPV4_HEADER_LEN]);
        assert_eq!(cited[IPV4_HEADER_LEN..], original[IPV4_HEADER_LEN..IPV4_HEADER_LEN + 8]);
    }

    #[test]
    fn rebind_replaces_handler() {
        fn drop_it(_: &mut Context<'_, '_>, _: usize) -> Result<()> {
            Ok(())
        }
        let mut binds = Binds::new(vec![Bind::default(); 2]);
        binds.bind(7, echo).unwrap();
        binds.bind(7, drop_it).unwrap();
        assert_eq!(binds.lookup(7), Some(drop_it as Handler));
        // the rebind did not burn a second slot
        binds.bind(8, echo).unwrap();
        assert_eq!(binds.bind(0, echo), Err(Error::Busy));
    }

    #[test]
    fn bind_table_exhaustion() {
        let mut binds = Binds::new(vec![Bind::default(); 1]);
        binds.bind(7, echo).unwrap();
        assert_eq!(binds.bind(8, echo), Err(Error::Exhausted));
    }
}
