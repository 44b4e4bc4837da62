//! ICMPv6 echo handling and neighbor discovery.

use crate::wire::{
    checksum, icmpv6_packet, ipv6_packet, Icmpv6Message, IpAddress, IpProtocol,
    Ipv6Address, NA_FLAG_OVERRIDE, NA_FLAG_SOLICITED, ND_MSG_LEN,
    ND_OPT_LLADDR_LEN, OPT_SOURCE_LLADDR,
};

use super::{ipv6 as ip6, Context, Error, Result};

/// Neighbor discovery messages must arrive with this hop limit.
const ND_HOP_LIMIT: u8 = 255;

/// Process a received message.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let l4_len = ctx.len - ctx.l4_start;
    let (src, dst) = match (&ctx.src_addr, &ctx.dst_addr) {
        (IpAddress::Ipv6(src), IpAddress::Ipv6(dst)) => (*src, *dst),
        _ => return Err(Error::Malformed),
    };

    let msg_type = {
        let pseudo = checksum::pseudo_header_v6(
            &src, &dst, IpProtocol::Icmpv6, l4_len as u32);
        let message = icmpv6_packet::new_checked(&ctx.frame[ctx.l4_start..ctx.len])?;
        if !message.verify_checksum(pseudo) {
            net_debug!("icmpv6: bad checksum from {}", src);
            return Err(Error::Malformed);
        }
        message.msg_type()
    };

    match msg_type {
        Icmpv6Message::EchoRequest => echo_reply(ctx, l4_len),
        Icmpv6Message::NeighborSolicitation => advertise(ctx, src),
        Icmpv6Message::NeighborAdvertisement => {
            // TODO: complete pending resolutions from advertisements once
            // the send path solicits instead of relying on seeded entries
            net_trace!("icmpv6: ignoring neighbor advertisement");
            Ok(())
        }
        msg_type => {
            net_trace!("icmpv6: ignoring type {:?}", msg_type);
            Ok(())
        }
    }
}

/// Answer an echo request by flipping the type in place.
fn echo_reply(ctx: &mut Context, l4_len: usize) -> Result<()> {
    let (reply_src, reply_dst) = ip6::reply_addrs(ctx)?;
    let pseudo = checksum::pseudo_header_v6(
        &reply_src, &reply_dst, IpProtocol::Icmpv6, l4_len as u32);
    {
        let message =
            icmpv6_packet::new_unchecked_mut(&mut ctx.frame[ctx.l4_start..ctx.len]);
        message.set_msg_type(Icmpv6Message::EchoReply);
        message.fill_checksum(pseudo);
    }
    ip6::reply(ctx, l4_len)
}

/// Answer a solicitation for one of our addresses in place.
fn advertise(ctx: &mut Context, peer: Ipv6Address) -> Result<()> {
    // a solicitation from the unspecified address is duplicate detection,
    // which we do not take part in
    if peer.is_unspecified() {
        return Ok(());
    }

    let target = {
        let message = icmpv6_packet::new_unchecked(&ctx.frame[ctx.l4_start..ctx.len]);
        message.check_nd_len()?;
        if let Some(mac) = message.nd_lladdr_option(OPT_SOURCE_LLADDR) {
            ctx.ndp.learn(peer, mac);
        }
        message.nd_target()
    };

    let ours = target == ctx.dev.ipv6_link_local()
        || ctx.dev.ipv6_global().map_or(false, |addr| addr == target);
    if !ours {
        return Ok(());
    }

    // the advertisement needs room for the target link address option
    let na_len = ND_MSG_LEN + ND_OPT_LLADDR_LEN;
    if ctx.l4_start + na_len > ctx.frame.len() {
        return Err(Error::Exhausted);
    }
    ctx.len = ctx.l4_start + na_len;

    let own_mac = ctx.dev.link_addr();
    let pseudo = checksum::pseudo_header_v6(
        &target, &peer, IpProtocol::Icmpv6, na_len as u32);
    {
        let message =
            icmpv6_packet::new_unchecked_mut(&mut ctx.frame[ctx.l4_start..ctx.len]);
        message.set_msg_type(Icmpv6Message::NeighborAdvertisement);
        message.set_msg_code(0);
        message.set_nd_flags(NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE);
        message.set_nd_target(target);
        message.set_nd_target_lladdr_option(own_mac);
        message.fill_checksum(pseudo);
    }
    {
        // an advertisement sources from the target address itself and
        // must carry the neighbor discovery hop limit
        let packet = ipv6_packet::new_unchecked_mut(&mut ctx.frame[ctx.l3_start..]);
        packet.set_src_addr(target);
        packet.set_dst_addr(peer);
        packet.set_hop_limit(ND_HOP_LIMIT);
        packet.set_payload_len(na_len as u16);
    }
    net_trace!("icmpv6: advertising {}", target);
    ctx.reply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nic::Device;
    use crate::stack::testing::{self, handle};
    use crate::wire::{
        ethernet_frame, EtherType, ETHERNET_HEADER_LEN, IPV6_HEADER_LEN,
        OPT_TARGET_LLADDR,
    };

    fn v6_frame(src: Ipv6Address, dst: Ipv6Address, l4_len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + IPV6_HEADER_LEN + l4_len];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(testing::MAC);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Ipv6);
        }
        {
            let packet = ipv6_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_ver_tc_flow_basic();
            packet.set_payload_len(l4_len as u16);
            packet.set_next_header(IpProtocol::Icmpv6);
            packet.set_hop_limit(255);
            packet.set_src_addr(src);
            packet.set_dst_addr(dst);
        }
        frame
    }

    #[test]
    fn echo_is_answered() {
        let mut stack = testing::stack();
        let peer = testing::peer_link_local();
        let own = stack.device().ipv6_link_local();

        let mut frame = v6_frame(peer, own, 8 + 4);
        {
            let at = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;
            frame[at + 8..].copy_from_slice(b"data");
            let pseudo = checksum::pseudo_header_v6(
                &peer, &own, IpProtocol::Icmpv6, 12);
            let message = icmpv6_packet::new_unchecked_mut(&mut frame[at..]);
            message.set_msg_type(Icmpv6Message::EchoRequest);
            message.set_msg_code(0);
            message.fill_checksum(pseudo);
        }
        handle(&mut stack, &mut frame).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let reply = &sent[0];
        let packet = ipv6_packet::new_checked(&reply[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.src_addr(), own);
        assert_eq!(packet.dst_addr(), peer);

        let at = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;
        let message = icmpv6_packet::new_checked(&reply[at..]).unwrap();
        assert_eq!(message.msg_type(), Icmpv6Message::EchoReply);
        let pseudo = checksum::pseudo_header_v6(
            &own, &peer, IpProtocol::Icmpv6, 12);
        assert!(message.verify_checksum(pseudo));
    }

    #[test]
    fn solicitation_is_advertised() {
        let mut stack = testing::stack();
        let peer = testing::peer_link_local();
        let own = stack.device().ipv6_link_local();

        // solicitation without options, as a minimal host may send it
        let mut frame = v6_frame(peer, own, ND_MSG_LEN);
        {
            let at = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;
            let pseudo = checksum::pseudo_header_v6(
                &peer, &own, IpProtocol::Icmpv6, ND_MSG_LEN as u32);
            let message = icmpv6_packet::new_unchecked_mut(&mut frame[at..]);
            message.set_msg_type(Icmpv6Message::NeighborSolicitation);
            message.set_msg_code(0);
            message.set_nd_target(own);
            message.fill_checksum(pseudo);
        }
        // leave room for the reply to grow by the option
        frame.extend_from_slice(&[0u8; ND_OPT_LLADDR_LEN]);
        let len = frame.len() - ND_OPT_LLADDR_LEN;
        testing::handle_len(&mut stack, &mut frame, len).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let advert = &sent[0];

        let packet = ipv6_packet::new_checked(&advert[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.src_addr(), own);
        assert_eq!(packet.dst_addr(), peer);
        assert_eq!(packet.hop_limit(), 255);

        let at = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;
        let message = icmpv6_packet::new_checked(&advert[at..]).unwrap();
        assert_eq!(message.msg_type(), Icmpv6Message::NeighborAdvertisement);
        assert_eq!(message.nd_flags(), NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE);
        assert_eq!(message.nd_target(), own);
        assert_eq!(
            message.nd_lladdr_option(OPT_TARGET_LLADDR),
            Some(testing::MAC)
        );
        let pseudo = checksum::pseudo_header_v6(
            &own, &peer, IpProtocol::Icmpv6,
            (ND_MSG_LEN + ND_OPT_LLADDR_LEN) as u32);
        assert!(message.verify_checksum(pseudo));
    }

    #[test]
    fn solicitation_for_someone_else_is_ignored() {
        let mut stack = testing::stack();
        let peer = testing::peer_link_local();
        let own = stack.device().ipv6_link_local();
        let other = Ipv6Address::link_local_from_iid([9; 8]);

        let mut frame = v6_frame(peer, own, ND_MSG_LEN);
        {
            let at = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;
            let pseudo = checksum::pseudo_header_v6(
                &peer, &own, IpProtocol::Icmpv6, ND_MSG_LEN as u32);
            let message = icmpv6_packet::new_unchecked_mut(&mut frame[at..]);
            message.set_msg_type(Icmpv6Message::NeighborSolicitation);
            message.set_nd_target(other);
            message.fill_checksum(pseudo);
        }
        handle(&mut stack, &mut frame).unwrap();
        assert!(stack.device().sent().is_empty());
    }
}
