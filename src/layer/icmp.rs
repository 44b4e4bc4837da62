//! ICMPv4 echo handling and error generation.

use crate::wire::{
    icmpv4_packet, ipv4_packet, Icmpv4Message, IpAddress, IpProtocol,
    ICMPV4_HEADER_LEN, UNREACHABLE_PORT,
};

use super::{ipv4 as ip4, Context, Error, Result};

/// How much of the offending datagram an error message carries: its IP
/// header, options included, plus the first eight payload octets.
const CITE_MAX: usize = 60 + 8;

/// Process a received message.
///
/// Echo requests are answered by flipping the type in place; everything
/// else is dropped.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let l4_len = ctx.len - ctx.l4_start;
    {
        let message = icmpv4_packet::new_checked(&ctx.frame[ctx.l4_start..ctx.len])?;
        if !message.verify_checksum() {
            net_debug!("icmp: bad checksum from {}", ctx.src_addr);
            return Err(Error::Malformed);
        }
        match (message.msg_type(), message.msg_code()) {
            (Icmpv4Message::EchoRequest, 0) => {}
            (msg_type, _) => {
                net_trace!("icmp: ignoring type {:?}", msg_type);
                return Ok(());
            }
        }
    }

    {
        let message =
            icmpv4_packet::new_unchecked_mut(&mut ctx.frame[ctx.l4_start..ctx.len]);
        message.set_msg_type(Icmpv4Message::EchoReply);
        message.fill_checksum();
    }
    ip4::reply(ctx, l4_len)
}

/// Send a destination unreachable, code port, citing the current frame.
pub fn port_unreachable(ctx: &mut Context) -> Result<()> {
    let dst = match ctx.src_addr {
        IpAddress::Ipv4(addr) => addr,
        _ => return Err(Error::Unreachable),
    };
    // never answer an error or a broadcast with an error
    if dst.looks_like_broadcast() || dst.is_unspecified() {
        return Ok(());
    }

    let header_len =
        ipv4_packet::new_unchecked(&ctx.frame[ctx.l3_start..]).header_len();
    let cite_len = (header_len + 8).min(ctx.len - ctx.l3_start);
    let mut buffer = [0u8; ICMPV4_HEADER_LEN + CITE_MAX];
    let message_len = ICMPV4_HEADER_LEN + cite_len;
    buffer[ICMPV4_HEADER_LEN..message_len]
        .copy_from_slice(&ctx.frame[ctx.l3_start..ctx.l3_start + cite_len]);
    {
        let message = icmpv4_packet::new_unchecked_mut(&mut buffer[..message_len]);
        message.set_msg_type(Icmpv4Message::DestUnreachable);
        message.set_msg_code(UNREACHABLE_PORT);
        message.clear_rest();
        message.fill_checksum();
    }

    net_trace!("icmp: port unreachable to {}", dst);
    ip4::send(
        ctx.dev,
        ctx.arp,
        ctx.routes,
        dst,
        IpProtocol::Icmp,
        &mut buffer[..message_len],
        &[],
    )
}

#[cfg(test)]
mod tests {
    use crate::stack::testing::{self, handle};
    use crate::wire::{
        ethernet_frame, icmpv4_packet, ipv4_packet, EtherType, Icmpv4Message,
        IpProtocol, ETHERNET_HEADER_LEN, IPV4_HEADER_LEN,
    };

    fn echo_request(payload: &[u8]) -> Vec<u8> {
        let l4_len = 8 + payload.len();
        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + l4_len];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(testing::MAC);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Ipv4);
        }
        {
            let packet = ipv4_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_ver_ihl_basic();
            packet.set_total_len((IPV4_HEADER_LEN + l4_len) as u16);
            packet.set_ttl(64);
            packet.set_protocol(IpProtocol::Icmp);
            packet.set_src_addr(testing::PEER_IP);
            packet.set_dst_addr(testing::IP);
            packet.fill_checksum();
        }
        {
            let at = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
            frame[at + 8..].copy_from_slice(payload);
            let message = icmpv4_packet::new_unchecked_mut(&mut frame[at..]);
            message.set_msg_type(Icmpv4Message::EchoRequest);
            message.set_msg_code(0);
            message.fill_checksum();
        }
        frame
    }

    #[test]
    fn echo_is_answered_in_place() {
        let mut stack = testing::stack();
        let mut frame = echo_request(b"ping payload");
        handle(&mut stack, &mut frame).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let reply = &sent[0];

        let eth = ethernet_frame::new_checked(&reply[..]).unwrap();
        assert_eq!(eth.dst_addr(), testing::PEER_MAC);
        assert_eq!(eth.src_addr(), testing::MAC);

        let packet = ipv4_packet::new_checked(&reply[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.src_addr(), testing::IP);
        assert_eq!(packet.dst_addr(), testing::PEER_IP);
        assert!(packet.verify_checksum());

        let message =
            icmpv4_packet::new_checked(&reply[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..]).unwrap();
        assert_eq!(message.msg_type(), Icmpv4Message::EchoReply);
        assert!(message.verify_checksum());
        assert_eq!(&reply[reply.len() - 12..], b"ping payload");
    }

    #[test]
    fn corrupt_echo_is_dropped() {
        let mut stack = testing::stack();
        let mut frame = echo_request(b"ping");
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert!(handle(&mut stack, &mut frame).is_err());
        assert!(stack.device().sent().is_empty());
    }
}
