//! IPv4 receive handling and datagram emission.

use byteorder::{ByteOrder, NetworkEndian};

use crate::nic::Device;
use crate::wire::{
    checksum, ipv4_packet, EtherType, EthernetAddress, IpAddress, IpProtocol,
    Ipv4Address, IPV4_HEADER_LEN,
};

use super::{arp, icmp, route, tcp, udp, Context, Error, Result};

/// The hop limit on everything we originate.
pub const TTL: u8 = 64;

/// Most chunks a single datagram can be scattered over: header, the
/// transport header and a few payload segments.
const MAX_CHUNKS: usize = 8;

/// Process a received datagram.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let own_addr = ctx.dev.ipv4_addr();

    let (header_len, total_len, protocol, src, dst) = {
        let packet = ipv4_packet::new_checked(&ctx.frame[ctx.l3_start..ctx.len])?;
        if packet.version() != 4 {
            return Err(Error::Malformed);
        }
        let header_len = packet.header_len();
        if header_len < IPV4_HEADER_LEN || header_len > packet.total_len() as usize {
            return Err(Error::Malformed);
        }
        if !packet.verify_checksum() {
            net_debug!("ipv4: bad header checksum from {}", packet.src_addr());
            return Err(Error::Malformed);
        }
        (
            header_len,
            packet.total_len() as usize,
            packet.protocol(),
            packet.src_addr(),
            packet.dst_addr(),
        )
    };

    // the link layer may pad short frames; narrow to the declared length
    if ctx.l3_start + total_len > ctx.len {
        return Err(Error::Truncated);
    }
    ctx.len = ctx.l3_start + total_len;

    if dst != own_addr && !dst.looks_like_broadcast() && !dst.is_multicast() {
        return Ok(());
    }

    ctx.src_addr = IpAddress::Ipv4(src);
    ctx.dst_addr = IpAddress::Ipv4(dst);
    ctx.l4_start = ctx.l3_start + header_len;

    // a host that talks to us is worth a neighbor entry
    ctx.arp.learn(src, ctx.src_mac);

    match protocol {
        IpProtocol::Icmp => icmp::handle(ctx),
        IpProtocol::Udp => udp::handle(ctx),
        IpProtocol::Tcp => tcp::handle(ctx),
        protocol => {
            net_trace!("ipv4: no handler for protocol {}", protocol);
            Err(Error::Unrecognized)
        }
    }
}

/// Send one datagram built from a transport header and payload segments.
///
/// For TCP the transport checksum is computed here, over the pseudo
/// header and the scattered payload, and written into `l4`; the caller
/// leaves that field zeroed. UDP and ICMP checksums are optional over
/// IPv4 and stay at whatever the caller put there.
pub fn send(
    dev: &mut dyn Device,
    cache: &mut arp::Cache,
    routes: &route::Routes,
    dst: Ipv4Address,
    protocol: IpProtocol,
    l4: &mut [u8],
    payload: &[&[u8]],
) -> Result<()> {
    if payload.len() > MAX_CHUNKS - 2 {
        return Err(Error::Exhausted);
    }

    let l4_len = l4.len() + payload.iter().map(|chunk| chunk.len()).sum::<usize>();
    let total_len = IPV4_HEADER_LEN + l4_len;
    if total_len > dev.mtu() {
        return Err(Error::Exhausted);
    }
    let src = dev.ipv4_addr();

    if protocol == IpProtocol::Tcp {
        let at = 16;
        let pseudo = checksum::pseudo_header_v4(src, dst, protocol, l4_len as u16);
        l4[at] = 0;
        l4[at + 1] = 0;
        let mut accum = checksum::Accumulator::new(pseudo);
        accum.push(l4);
        accum.push_chunks(payload);
        let sum = !accum.finish();
        NetworkEndian::write_u16(&mut l4[at..at + 2], sum);
    }

    let mut header = [0u8; IPV4_HEADER_LEN];
    {
        let packet = ipv4_packet::new_unchecked_mut(&mut header);
        packet.set_ver_ihl_basic();
        packet.set_total_len(total_len as u16);
        packet.set_ttl(TTL);
        packet.set_protocol(protocol);
        packet.set_src_addr(src);
        packet.set_dst_addr(dst);
        packet.fill_checksum();
    }

    let mac = if dst.looks_like_broadcast() {
        EthernetAddress::BROADCAST
    } else {
        let next_hop = routes.lookup_v4(dst).ok_or(Error::Unreachable)?;
        cache.resolve(dev, next_hop)?
    };

    let mut chunks: [&[u8]; MAX_CHUNKS] = [&[]; MAX_CHUNKS];
    chunks[0] = &header;
    chunks[1] = l4;
    for (slot, chunk) in chunks[2..].iter_mut().zip(payload) {
        *slot = chunk;
    }
    dev.send(mac, EtherType::Ipv4, &chunks[..2 + payload.len()])?;
    Ok(())
}

/// Turn the received datagram into a reply to its sender and transmit.
///
/// The transport layer has already rewritten its part of the buffer;
/// `l4_len` is the length of that rewritten payload.
pub fn reply(ctx: &mut Context, l4_len: usize) -> Result<()> {
    let own_addr = ctx.dev.ipv4_addr();
    let header_len;
    {
        let packet = ipv4_packet::new_unchecked_mut(&mut ctx.frame[ctx.l3_start..]);
        header_len = packet.header_len();
        let peer = packet.src_addr();
        packet.set_src_addr(own_addr);
        packet.set_dst_addr(peer);
        packet.set_ttl(TTL);
        packet.set_total_len((header_len + l4_len) as u16);
        packet.fill_checksum();
    }
    ctx.len = ctx.l3_start + header_len + l4_len;
    ctx.reply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::testing::{self, handle};
    use crate::wire::{
        ethernet_frame, udp_packet, ETHERNET_HEADER_LEN, UDP_HEADER_LEN,
    };

    fn build_frame(total_len_field: u16, payload: usize) -> Vec<u8> {
        let mut frame =
            vec![0u8; ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + payload];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(testing::MAC);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Ipv4);
        }
        {
            let packet = ipv4_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_ver_ihl_basic();
            packet.set_total_len(total_len_field);
            packet.set_ttl(TTL);
            packet.set_protocol(IpProtocol::Udp);
            packet.set_src_addr(testing::PEER_IP);
            packet.set_dst_addr(testing::IP);
            packet.fill_checksum();
        }
        frame
    }

    fn fill_udp(frame: &mut [u8], payload_len: usize) {
        let datagram =
            udp_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..]);
        datagram.set_src_port(4000);
        datagram.set_dst_port(7);
        datagram.set_length((UDP_HEADER_LEN + payload_len) as u16);
        datagram.set_checksum(0);
    }

    #[test]
    fn truncation_boundaries() {
        let mut stack = testing::stack();
        let l4 = UDP_HEADER_LEN + 4;

        // declared length equal to what arrived parses through
        let mut exact = build_frame((IPV4_HEADER_LEN + l4) as u16, l4);
        fill_udp(&mut exact, 4);
        assert_ne!(handle(&mut stack, &mut exact), Err(Error::Truncated));

        // one byte more than what arrived is truncated
        let mut long = build_frame((IPV4_HEADER_LEN + l4 + 1) as u16, l4);
        fill_udp(&mut long, 4);
        assert_eq!(handle(&mut stack, &mut long), Err(Error::Truncated));

        // one byte less is not: the excess is link layer padding
        let mut padded = build_frame((IPV4_HEADER_LEN + l4) as u16, l4 + 1);
        fill_udp(&mut padded, 4);
        assert_ne!(handle(&mut stack, &mut padded), Err(Error::Truncated));
    }

    #[test]
    fn bad_checksum_is_dropped() {
        let mut stack = testing::stack();
        let l4 = UDP_HEADER_LEN;
        let mut frame = build_frame((IPV4_HEADER_LEN + l4) as u16, l4);
        fill_udp(&mut frame, 0);
        frame[ETHERNET_HEADER_LEN + 10] ^= 0xff;
        assert_eq!(handle(&mut stack, &mut frame), Err(Error::Malformed));
    }

    #[test]
    fn foreign_destination_is_ignored() {
        let mut stack = testing::stack();
        let l4 = UDP_HEADER_LEN;
        let mut frame = build_frame((IPV4_HEADER_LEN + l4) as u16, l4);
        fill_udp(&mut frame, 0);
        {
            let packet = ipv4_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_dst_addr(Ipv4Address::new(10, 0, 0, 77));
            packet.fill_checksum();
        }
        assert_eq!(handle(&mut stack, &mut frame), Ok(()));
        assert!(stack.device().sent().is_empty());
    }
}
