//! IPv6 receive handling and packet emission.

use byteorder::{ByteOrder, NetworkEndian};

use crate::nic::Device;
use crate::wire::{
    checksum, ipv6_packet, EtherType, EthernetAddress, IpAddress, IpProtocol,
    Ipv6Address, IPV6_HEADER_LEN,
};

use super::{icmpv6, ndp, route, tcp, udp, Context, Error, Result};

/// The hop limit on everything we originate.
pub const HOP_LIMIT: u8 = 64;

const MAX_CHUNKS: usize = 8;

/// Process a received packet. Extension headers are not understood and
/// end processing.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let (payload_len, next_header, src, dst) = {
        let packet = ipv6_packet::new_checked(&ctx.frame[ctx.l3_start..ctx.len])?;
        if packet.version() != 6 {
            return Err(Error::Malformed);
        }
        (
            usize::from(packet.payload_len()),
            packet.next_header(),
            packet.src_addr(),
            packet.dst_addr(),
        )
    };

    if ctx.l3_start + IPV6_HEADER_LEN + payload_len > ctx.len {
        return Err(Error::Truncated);
    }
    ctx.len = ctx.l3_start + IPV6_HEADER_LEN + payload_len;

    if !is_for_us(ctx.dev, &dst) {
        return Ok(());
    }

    ctx.src_addr = IpAddress::Ipv6(src);
    ctx.dst_addr = IpAddress::Ipv6(dst);
    ctx.l4_start = ctx.l3_start + IPV6_HEADER_LEN;

    match next_header {
        IpProtocol::Icmpv6 => icmpv6::handle(ctx),
        IpProtocol::Udp => udp::handle(ctx),
        IpProtocol::Tcp => tcp::handle(ctx),
        next_header => {
            net_trace!("ipv6: no handler for next header {}", next_header);
            Err(Error::Unrecognized)
        }
    }
}

fn is_for_us(dev: &dyn Device, dst: &Ipv6Address) -> bool {
    if *dst == dev.ipv6_link_local() {
        return true;
    }
    if dev.ipv6_global().map_or(false, |addr| addr == *dst) {
        return true;
    }
    // all-nodes and solicited-node groups, without tracking membership
    dst.is_multicast()
}

/// Send one packet built from a transport header and payload segments.
///
/// The transport checksum, mandatory for every protocol carried here,
/// is computed over the pseudo header and written into `l4`.
pub fn send(
    dev: &mut dyn Device,
    neighbors: &mut ndp::Cache,
    routes: &route::Routes,
    dst: &Ipv6Address,
    next_header: IpProtocol,
    l4: &mut [u8],
    payload: &[&[u8]],
) -> Result<()> {
    if payload.len() > MAX_CHUNKS - 2 {
        return Err(Error::Exhausted);
    }

    let src = source_towards(dev, dst);
    let payload_len =
        l4.len() + payload.iter().map(|chunk| chunk.len()).sum::<usize>();
    if IPV6_HEADER_LEN + payload_len > dev.mtu() {
        return Err(Error::Exhausted);
    }

    if let Some(at) = checksum_offset(next_header) {
        let pseudo =
            checksum::pseudo_header_v6(&src, dst, next_header, payload_len as u32);
        l4[at] = 0;
        l4[at + 1] = 0;
        let mut accum = checksum::Accumulator::new(pseudo);
        accum.push(l4);
        accum.push_chunks(payload);
        let mut sum = !accum.finish();
        if next_header == IpProtocol::Udp && sum == 0 {
            sum = 0xffff;
        }
        NetworkEndian::write_u16(&mut l4[at..at + 2], sum);
    }

    let mut header = [0u8; IPV6_HEADER_LEN];
    {
        let packet = ipv6_packet::new_unchecked_mut(&mut header);
        packet.set_ver_tc_flow_basic();
        packet.set_payload_len(payload_len as u16);
        packet.set_next_header(next_header);
        packet.set_hop_limit(HOP_LIMIT);
        packet.set_src_addr(src);
        packet.set_dst_addr(*dst);
    }

    let mac = if dst.is_multicast() {
        multicast_mac(dst)
    } else {
        let next_hop = routes.lookup_v6(dst).ok_or(Error::Unreachable)?;
        neighbors.lookup(&next_hop).ok_or(Error::Unresolved)?
    };

    let mut chunks: [&[u8]; MAX_CHUNKS] = [&[]; MAX_CHUNKS];
    chunks[0] = &header;
    chunks[1] = l4;
    for (slot, chunk) in chunks[2..].iter_mut().zip(payload) {
        *slot = chunk;
    }
    dev.send(mac, EtherType::Ipv6, &chunks[..2 + payload.len()])?;
    Ok(())
}

/// The addresses an in-place reply to the current frame will carry.
pub fn reply_addrs(ctx: &Context) -> Result<(Ipv6Address, Ipv6Address)> {
    let (src, dst) = match (&ctx.src_addr, &ctx.dst_addr) {
        (IpAddress::Ipv6(src), IpAddress::Ipv6(dst)) => (*src, *dst),
        _ => return Err(Error::Malformed),
    };
    let own = if dst.is_multicast() {
        source_towards(&*ctx.dev, &src)
    } else {
        dst
    };
    Ok((own, src))
}

/// Turn the received packet into a reply to its sender and transmit.
pub fn reply(ctx: &mut Context, payload_len: usize) -> Result<()> {
    let (src, dst) = reply_addrs(ctx)?;
    {
        let packet = ipv6_packet::new_unchecked_mut(&mut ctx.frame[ctx.l3_start..]);
        packet.set_src_addr(src);
        packet.set_dst_addr(dst);
        packet.set_hop_limit(HOP_LIMIT);
        packet.set_payload_len(payload_len as u16);
    }
    ctx.len = ctx.l3_start + IPV6_HEADER_LEN + payload_len;
    ctx.reply()
}

fn source_towards(dev: &dyn Device, dst: &Ipv6Address) -> Ipv6Address {
    if dst.is_link_local() {
        dev.ipv6_link_local()
    } else {
        dev.ipv6_global().unwrap_or_else(|| dev.ipv6_link_local())
    }
}

/// The Ethernet group address an IPv6 group maps onto.
fn multicast_mac(dst: &Ipv6Address) -> EthernetAddress {
    let octets = dst.as_bytes();
    EthernetAddress([0x33, 0x33, octets[12], octets[13], octets[14], octets[15]])
}

fn checksum_offset(next_header: IpProtocol) -> Option<usize> {
    match next_header {
        IpProtocol::Udp => Some(6),
        IpProtocol::Tcp => Some(16),
        IpProtocol::Icmpv6 => Some(2),
        _ => None,
    }
}
