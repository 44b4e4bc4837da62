//! Link layer receive dispatch.

use crate::wire::{ethernet_frame, EtherType, ETHERNET_HEADER_LEN};

use super::{arp, ipv4, ipv6, Context, Error, Result};

/// Process one received frame.
///
/// Frames addressed to neither our unicast address nor a group address
/// are dropped silently; a filtering interface would not have delivered
/// them in the first place.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let (dst, src, ethertype) = {
        let frame = ethernet_frame::new_checked(&ctx.frame[..ctx.len])?;
        (frame.dst_addr(), frame.src_addr(), frame.ethertype())
    };

    if dst != ctx.dev.link_addr() && !dst.is_multicast() {
        return Ok(());
    }

    ctx.src_mac = src;
    ctx.dst_mac = dst;
    ctx.l3_start = ETHERNET_HEADER_LEN;

    match ethertype {
        EtherType::Arp => arp::handle(ctx),
        EtherType::Ipv4 => ipv4::handle(ctx),
        EtherType::Ipv6 => ipv6::handle(ctx),
        EtherType::Unknown(ty) => {
            net_trace!("eth: dropping frame with ethertype 0x{:04x}", ty);
            Err(Error::Unrecognized)
        }
    }
}
