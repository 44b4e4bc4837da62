//! A client-side TCP endpoint.
//!
//! Connections are initiated locally and tracked in fixed slots; there
//! is no listen state. The receive path insists on exactly the sequence
//! number it expects next: anything else resets the connection rather
//! than buffering out of order data. Outbound data is queued into a per
//! connection ring and drained by [`Endpoint::poll`], so transmission
//! happens on the caller's schedule and never from inside a handler
//! that already holds the stack.

use byteorder::{ByteOrder, NetworkEndian};

use crate::managed::Slice;
use crate::nic::Device;
use crate::storage::Ring;
use crate::wire::{
    checksum, tcp_packet, IpAddress, IpProtocol, TcpFlags, TcpSeqNumber,
    TCP_HEADER_LEN,
};

use super::{
    arp, ipv4, ipv6, ndp, route, Context, Error, Result, SendContext,
};

/// Largest payload of a single outbound segment. No options are
/// exchanged, so the conservative default from RFC 1122 applies.
pub const MSS: usize = 536;

/// A connection state.
///
/// The endpoint only initiates connections, so of the full set only the
/// client-side states are ever entered: `Listen`, `SynReceived`,
/// `Closing`, `LastAck` and `TimeWait` exist for completeness. A peer
/// FIN is acknowledged together with our own, which parks the slot in
/// [`State::CloseWait`] until that FIN's final ACK arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Slot is free.
    Closed,
    /// Waiting for an incoming SYN; never entered.
    Listen,
    /// Our SYN is out, nothing heard yet.
    SynSent,
    /// A SYN was answered but not completed; never entered.
    SynReceived,
    /// Data may flow.
    Established,
    /// We closed first, FIN not yet acknowledged.
    FinWait1,
    /// Our FIN is acknowledged, the peer may still send.
    FinWait2,
    /// The peer closed; our own FIN went out with the acknowledgment
    /// and awaits its final ACK.
    CloseWait,
    /// Simultaneous close; never entered.
    Closing,
    /// Passive close completion; never entered, see [`State::CloseWait`].
    LastAck,
    /// Quiet time after an active close; never entered.
    TimeWait,
}

/// A reference to one connection.
///
/// Carries the generation of the slot it was created for, so a handle
/// kept across a teardown and reuse of the slot is refused instead of
/// silently addressing the new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    idx: usize,
    gen: u32,
}

/// One connection slot with its buffer storage.
#[derive(Debug)]
pub struct Slot<'e> {
    gen: u32,
    state: State,
    remote: IpAddress,
    remote_port: u16,
    local_port: u16,
    iss: TcpSeqNumber,
    irs: TcpSeqNumber,
    /// Send offsets relative to `iss`.
    snd_una: u32,
    snd_nxt: u32,
    /// Receive offset relative to `irs`.
    rcv_nxt: u32,
    /// The peer's advertised window.
    snd_wnd: u16,
    rx: Ring<'e>,
    tx: Ring<'e>,
}

impl<'e> Slot<'e> {
    /// Create a free slot over receive and transmit buffer storage.
    pub fn new<R, T>(rx: R, tx: T) -> Self
        where R: Into<Slice<'e, u8>>, T: Into<Slice<'e, u8>>
    {
        Slot {
            gen: 0,
            state: State::Closed,
            remote: IpAddress::Unspecified,
            remote_port: 0,
            local_port: 0,
            iss: TcpSeqNumber(0),
            irs: TcpSeqNumber(0),
            snd_una: 0,
            snd_nxt: 0,
            rcv_nxt: 0,
            snd_wnd: 0,
            rx: Ring::new(rx),
            tx: Ring::new(tx),
        }
    }

    fn open(
        &mut self,
        remote: IpAddress,
        remote_port: u16,
        local_port: u16,
        iss: TcpSeqNumber,
    ) {
        self.remote = remote;
        self.remote_port = remote_port;
        self.local_port = local_port;
        self.iss = iss;
        self.irs = TcpSeqNumber(0);
        self.snd_una = 0;
        self.snd_nxt = 0;
        self.rcv_nxt = 0;
        self.snd_wnd = 0;
        self.rx.clear();
        self.tx.clear();
    }

    fn teardown(&mut self) {
        self.state = State::Closed;
        self.gen = self.gen.wrapping_add(1);
    }

    /// The window to advertise: free receive space, clamped to the
    /// sixteen bits of the field.
    fn rx_window(&self) -> u16 {
        self.rx.window().min(usize::from(u16::MAX)) as u16
    }

    /// Whether everything queued by `write` has been sent and
    /// acknowledged.
    fn write_done(&self) -> bool {
        self.tx.is_empty() && self.snd_una == self.snd_nxt
    }
}

/// All connection slots.
#[derive(Debug)]
pub struct Endpoint<'e> {
    slots: Slice<'e, Slot<'e>>,
}

impl<'e> Endpoint<'e> {
    /// Create an endpoint over the given slots.
    pub fn new<C>(slots: C) -> Self
        where C: Into<Slice<'e, Slot<'e>>>
    {
        Endpoint { slots: slots.into() }
    }

    /// Open a connection, transmitting the initial SYN.
    ///
    /// Resolution of the first hop may still be in flight, in which
    /// case this fails with [`Error::Unresolved`] and can simply be
    /// retried; the slot is not consumed.
    pub fn connect(
        &mut self,
        send: &mut SendContext,
        remote: IpAddress,
        remote_port: u16,
        local_port: u16,
        iss: TcpSeqNumber,
    ) -> Result<Handle> {
        let in_use = self.slots.iter().any(|slot| {
            slot.state != State::Closed
                && slot.remote == remote
                && slot.remote_port == remote_port
                && slot.local_port == local_port
        });
        if in_use {
            return Err(Error::Busy);
        }

        let idx = self.slots.iter()
            .position(|slot| slot.state == State::Closed)
            .ok_or(Error::Exhausted)?;
        let slot = &mut self.slots[idx];
        slot.open(remote, remote_port, local_port, iss);

        emit(
            send.dev, send.arp, send.ndp, send.routes,
            slot, TcpFlags::SYN, iss, &[],
        )?;
        slot.state = State::SynSent;
        slot.snd_nxt = 1;
        net_debug!("tcp: connecting to {}:{}", remote, remote_port);
        Ok(Handle { idx, gen: slot.gen })
    }

    /// Queue data for transmission on the next [`Endpoint::poll`].
    ///
    /// Returns how much fit into the transmit buffer; zero free space
    /// is reported as [`Error::Busy`].
    pub fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize> {
        let slot = self.get_mut(handle)?;
        if slot.state != State::Established {
            return Err(Error::Busy);
        }
        match slot.tx.push(data) {
            0 if !data.is_empty() => Err(Error::Busy),
            queued => Ok(queued),
        }
    }

    /// Transmit queued data as far as the peer's window allows.
    ///
    /// Returns whether every byte handed to [`Endpoint::write`] so far
    /// is out and acknowledged.
    pub fn poll(&mut self, send: &mut SendContext, handle: Handle) -> Result<bool> {
        let idx = self.index_of(handle)?;
        let slot = &mut self.slots[idx];
        if slot.state == State::Established {
            let in_flight = slot.snd_nxt - slot.snd_una;
            let usable = u32::from(slot.snd_wnd).saturating_sub(in_flight) as usize;
            let len = slot.tx.len().min(usable).min(MSS);
            if len > 0 {
                let mut buf = [0u8; MSS];
                slot.tx.peek(&mut buf[..len]);
                let seq = slot.iss + slot.snd_nxt;
                emit(
                    send.dev, send.arp, send.ndp, send.routes,
                    slot, TcpFlags::PSH | TcpFlags::ACK, seq, &[&buf[..len]],
                )?;
                slot.tx.consume(len);
                slot.snd_nxt += len as u32;
            }
        }
        Ok(self.slots[idx].write_done())
    }

    /// Whether all written data is sent and acknowledged.
    pub fn write_done(&self, handle: Handle) -> Result<bool> {
        Ok(self.get(handle)?.write_done())
    }

    /// Drain received data into `buf`, returning how much was copied.
    pub fn recv(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let slot = self.get_mut(handle)?;
        Ok(slot.rx.pop(buf))
    }

    /// Close the connection.
    ///
    /// In the established state this sends our FIN; a connection still
    /// in the handshake is abandoned without a segment.
    pub fn close(&mut self, send: &mut SendContext, handle: Handle) -> Result<()> {
        let slot = self.get_mut(handle)?;
        match slot.state {
            State::Established => {
                let seq = slot.iss + slot.snd_nxt;
                emit(
                    send.dev, send.arp, send.ndp, send.routes,
                    slot, TcpFlags::FIN | TcpFlags::ACK, seq, &[],
                )?;
                slot.snd_nxt += 1;
                slot.state = State::FinWait1;
                Ok(())
            }
            State::SynSent => {
                slot.teardown();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The state of a connection.
    pub fn state(&self, handle: Handle) -> Result<State> {
        Ok(self.get(handle)?.state)
    }

    fn index_of(&self, handle: Handle) -> Result<usize> {
        match self.slots.as_slice().get(handle.idx) {
            Some(slot) if slot.gen == handle.gen && slot.state != State::Closed => {
                Ok(handle.idx)
            }
            _ => Err(Error::BadHandle),
        }
    }

    fn get(&self, handle: Handle) -> Result<&Slot<'e>> {
        let idx = self.index_of(handle)?;
        Ok(&self.slots[idx])
    }

    fn get_mut(&mut self, handle: Handle) -> Result<&mut Slot<'e>> {
        let idx = self.index_of(handle)?;
        Ok(&mut self.slots[idx])
    }
}

/// What the receive path extracted from a segment header.
struct Segment {
    seq: TcpSeqNumber,
    ack: TcpSeqNumber,
    flags: TcpFlags,
    window: u16,
    payload_at: usize,
    payload_len: usize,
    /// The data offset pointed past the received bytes.
    bad_offset: bool,
}

/// Process a received segment.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let l4_start = ctx.l4_start;
    let l4_len = ctx.len - l4_start;

    let (src_port, dst_port, seg) = {
        let segment = tcp_packet::new_checked(&ctx.frame[l4_start..ctx.len])?;
        let header_len = segment.header_len();
        if header_len < TCP_HEADER_LEN {
            return Err(Error::Malformed);
        }
        (
            segment.src_port(),
            segment.dst_port(),
            Segment {
                seq: segment.seq_number(),
                ack: segment.ack_number(),
                flags: segment.flags(),
                window: segment.window(),
                payload_at: l4_start + header_len.min(l4_len),
                payload_len: l4_len.saturating_sub(header_len),
                bad_offset: header_len > l4_len,
            },
        )
    };

    let pseudo = pseudo_sum(&ctx.src_addr, &ctx.dst_addr, l4_len as u32)?;
    if checksum::data(pseudo, &ctx.frame[l4_start..ctx.len]) != 0xffff {
        net_debug!("tcp: bad checksum from {}", ctx.src_addr);
        return Err(Error::Malformed);
    }

    ctx.src_port = src_port;
    ctx.dst_port = dst_port;

    let remote = ctx.src_addr;
    let idx = ctx.tcp.slots.iter().position(|slot| {
        slot.state != State::Closed
            && slot.remote == remote
            && slot.remote_port == src_port
            && slot.local_port == dst_port
    });

    match idx {
        Some(idx) => process(ctx, idx, &seg),
        None => {
            // never answer a reset with a reset
            if seg.flags.contains(TcpFlags::RST) {
                return Ok(());
            }
            net_trace!("tcp: refusing segment to port {}", dst_port);
            refuse(ctx, &seg)
        }
    }
}

/// Run a matched segment through the connection state machine.
fn process(ctx: &mut Context, idx: usize, seg: &Segment) -> Result<()> {
    let Context { dev, arp, ndp, routes, tcp: endpoint, frame, .. } = ctx;
    let dev: &mut dyn Device = &mut **dev;
    let arp: &mut arp::Cache = &mut **arp;
    let ndp: &mut ndp::Cache = &mut **ndp;
    let routes: &route::Routes = &**routes;
    let slot = &mut endpoint.slots[idx];

    // an offset past the segment's end leaves no way to tell where the
    // data starts; give up on the connection
    if seg.bad_offset {
        net_debug!("tcp: data offset past segment end, resetting");
        let seq = slot.iss + slot.snd_nxt;
        emit(dev, arp, ndp, routes, slot, TcpFlags::RST | TcpFlags::ACK, seq, &[])?;
        slot.teardown();
        return Ok(());
    }

    if slot.state == State::SynSent {
        // a reset aborts the attempt outright, acknowledged or not
        if seg.flags.contains(TcpFlags::RST) {
            net_debug!("tcp: connection to {} refused", slot.remote);
            slot.teardown();
            return Err(Error::Refused);
        }
        if seg.flags.contains(TcpFlags::SYN) && seg.flags.contains(TcpFlags::ACK) {
            if seg.ack != slot.iss + 1 {
                emit(dev, arp, ndp, routes, slot, TcpFlags::RST, seg.ack, &[])?;
                slot.teardown();
                return Err(Error::Refused);
            }
            slot.irs = seg.seq;
            slot.rcv_nxt = 1;
            slot.snd_una = 1;
            slot.snd_wnd = seg.window;
            slot.state = State::Established;
            let seq = slot.iss + slot.snd_nxt;
            emit(dev, arp, ndp, routes, slot, TcpFlags::ACK, seq, &[])?;
            net_debug!("tcp: connection to {} established", slot.remote);
        }
        return Ok(());
    }

    // past the handshake only the exact next sequence number is taken;
    // anything else desynchronizes the connection and tears it down
    if seg.seq != slot.irs + slot.rcv_nxt {
        net_debug!(
            "tcp: expected seq {}, got {}, resetting",
            slot.irs + slot.rcv_nxt, seg.seq
        );
        let seq = slot.iss + slot.snd_nxt;
        emit(dev, arp, ndp, routes, slot, TcpFlags::RST | TcpFlags::ACK, seq, &[])?;
        slot.teardown();
        return Ok(());
    }

    if seg.flags.contains(TcpFlags::RST) {
        slot.teardown();
        return Ok(());
    }

    if seg.flags.contains(TcpFlags::ACK) {
        let acked = seg.ack.0.wrapping_sub(slot.iss.0);
        if acked >= slot.snd_una && acked <= slot.snd_nxt {
            slot.snd_una = acked;
        }
        slot.snd_wnd = seg.window;
    }

    match slot.state {
        State::Established => {
            let mut advance = false;
            if seg.payload_len > 0 {
                let payload = &frame[seg.payload_at..seg.payload_at + seg.payload_len];
                let accepted = slot.rx.push(payload);
                slot.rcv_nxt += accepted as u32;
                if accepted < seg.payload_len {
                    net_debug!(
                        "tcp: receive buffer full, dropped {} bytes",
                        seg.payload_len - accepted
                    );
                }
                advance = accepted > 0;
            }
            if seg.flags.contains(TcpFlags::FIN) {
                // acknowledge the peer's FIN and close our half with it
                slot.rcv_nxt += 1;
                let seq = slot.iss + slot.snd_nxt;
                emit(
                    dev, arp, ndp, routes,
                    slot, TcpFlags::FIN | TcpFlags::ACK, seq, &[],
                )?;
                slot.snd_nxt += 1;
                slot.state = State::CloseWait;
            } else if advance {
                let seq = slot.iss + slot.snd_nxt;
                emit(dev, arp, ndp, routes, slot, TcpFlags::ACK, seq, &[])?;
            }
            Ok(())
        }
        State::FinWait1 => {
            if seg.flags.contains(TcpFlags::FIN) {
                slot.rcv_nxt += 1;
                let seq = slot.iss + slot.snd_nxt;
                emit(dev, arp, ndp, routes, slot, TcpFlags::ACK, seq, &[])?;
                slot.teardown();
            } else if slot.snd_una == slot.snd_nxt {
                slot.state = State::FinWait2;
            }
            Ok(())
        }
        State::FinWait2 => {
            if seg.flags.contains(TcpFlags::FIN) {
                slot.rcv_nxt += 1;
                let seq = slot.iss + slot.snd_nxt;
                emit(dev, arp, ndp, routes, slot, TcpFlags::ACK, seq, &[])?;
                slot.teardown();
            }
            Ok(())
        }
        State::CloseWait => {
            if slot.snd_una == slot.snd_nxt {
                net_debug!("tcp: connection to {} closed", slot.remote);
                slot.teardown();
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Answer a segment no connection claims with a reset, in place.
fn refuse(ctx: &mut Context, seg: &Segment) -> Result<()> {
    let (seq, flags, ack) = if seg.flags.contains(TcpFlags::ACK) {
        (seg.ack, TcpFlags::RST, TcpSeqNumber(0))
    } else {
        let mut advance = seg.payload_len as u32;
        if seg.flags.contains(TcpFlags::SYN) {
            advance += 1;
        }
        if seg.flags.contains(TcpFlags::FIN) {
            advance += 1;
        }
        (TcpSeqNumber(0), TcpFlags::RST | TcpFlags::ACK, seg.seq + advance)
    };

    let src_port = ctx.dst_port;
    let dst_port = ctx.src_port;
    let l4_start = ctx.l4_start;
    ctx.len = l4_start + TCP_HEADER_LEN;
    {
        let header = &mut ctx.frame[l4_start..l4_start + TCP_HEADER_LEN];
        for byte in header.iter_mut() {
            *byte = 0;
        }
        let segment = tcp_packet::new_unchecked_mut(header);
        segment.set_src_port(src_port);
        segment.set_dst_port(dst_port);
        segment.set_seq_number(seq);
        segment.set_ack_number(ack);
        segment.set_data_offset_basic();
        segment.set_flags(flags);
    }
    reply_with_checksum(ctx, TCP_HEADER_LEN)
}

/// Compute the transport checksum of an in-place reply and transmit it.
fn reply_with_checksum(ctx: &mut Context, l4_len: usize) -> Result<()> {
    match ctx.dst_addr {
        IpAddress::Ipv4(own) => {
            let peer = match ctx.src_addr {
                IpAddress::Ipv4(addr) => addr,
                _ => return Err(Error::Malformed),
            };
            // the reply sources from the address the segment targeted
            let pseudo = checksum::pseudo_header_v4(
                own, peer, IpProtocol::Tcp, l4_len as u16);
            write_checksum(ctx, pseudo, l4_len);
            ipv4::reply(ctx, l4_len)
        }
        IpAddress::Ipv6(_) => {
            let (src, dst) = ipv6::reply_addrs(ctx)?;
            let pseudo = checksum::pseudo_header_v6(
                &src, &dst, IpProtocol::Tcp, l4_len as u32);
            write_checksum(ctx, pseudo, l4_len);
            ipv6::reply(ctx, l4_len)
        }
        IpAddress::Unspecified => Err(Error::Unreachable),
    }
}

fn write_checksum(ctx: &mut Context, pseudo: u16, l4_len: usize) {
    let at = ctx.l4_start + 16;
    ctx.frame[at] = 0;
    ctx.frame[at + 1] = 0;
    let sum = !checksum::data(pseudo, &ctx.frame[ctx.l4_start..ctx.l4_start + l4_len]);
    NetworkEndian::write_u16(&mut ctx.frame[at..at + 2], sum);
}

/// Build and transmit one segment for a connection.
fn emit(
    dev: &mut dyn Device,
    arp: &mut arp::Cache,
    ndp: &mut ndp::Cache,
    routes: &route::Routes,
    slot: &Slot,
    flags: TcpFlags,
    seq: TcpSeqNumber,
    payload: &[&[u8]],
) -> Result<()> {
    let mut header = [0u8; TCP_HEADER_LEN];
    {
        let segment = tcp_packet::new_unchecked_mut(&mut header);
        segment.set_src_port(slot.local_port);
        segment.set_dst_port(slot.remote_port);
        segment.set_seq_number(seq);
        if flags.contains(TcpFlags::ACK) {
            segment.set_ack_number(slot.irs + slot.rcv_nxt);
        }
        segment.set_data_offset_basic();
        segment.set_flags(flags);
        segment.set_window(slot.rx_window());
    }
    net_trace!("tcp: sending {} to {}:{}", flags, slot.remote, slot.remote_port);
    match slot.remote {
        IpAddress::Ipv4(addr) => ipv4::send(
            dev, arp, routes, addr, IpProtocol::Tcp, &mut header, payload,
        ),
        IpAddress::Ipv6(addr) => ipv6::send(
            dev, ndp, routes, &addr, IpProtocol::Tcp, &mut header, payload,
        ),
        IpAddress::Unspecified => Err(Error::Unreachable),
    }
}

fn pseudo_sum(src: &IpAddress, dst: &IpAddress, length: u32) -> Result<u16> {
    match (src, dst) {
        (IpAddress::Ipv4(src), IpAddress::Ipv4(dst)) => Ok(
            checksum::pseudo_header_v4(*src, *dst, IpProtocol::Tcp, length as u16),
        ),
        (IpAddress::Ipv6(src), IpAddress::Ipv6(dst)) => Ok(
            checksum::pseudo_header_v6(src, dst, IpProtocol::Tcp, length),
        ),
        _ => Err(Error::Malformed),
    }
}
