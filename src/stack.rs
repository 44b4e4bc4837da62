//! The assembled stack: one device plus all protocol state.

use crate::layer::{
    arp, eth, ndp, route, tcp, udp, Context, Error, Result, SendContext,
};
use crate::nic::Device;
use crate::wire::{EthernetAddress, IpAddress, TcpSeqNumber};

/// The protocol tables a stack runs on.
///
/// All storage is provided up front by the caller; the stack never
/// allocates afterwards.
pub struct Tables<'e> {
    pub arp: arp::Cache<'e>,
    pub ndp: ndp::Cache<'e>,
    pub routes: route::Routes<'e>,
    pub udp: udp::Binds<'e>,
    pub tcp: tcp::Endpoint<'e>,
    /// Seeds the initial sequence number generator; supply entropy
    /// here, a fixed seed makes connections predictable.
    pub seed: u32,
}

/// One network stack instance over a device.
pub struct Stack<'e, D> {
    dev: D,
    arp: arp::Cache<'e>,
    ndp: ndp::Cache<'e>,
    routes: route::Routes<'e>,
    udp: udp::Binds<'e>,
    tcp: tcp::Endpoint<'e>,
    isn_state: u32,
}

impl<'e, D: Device> Stack<'e, D> {
    /// Assemble a stack from a device and its tables.
    pub fn new(dev: D, tables: Tables<'e>) -> Self {
        Stack {
            dev,
            arp: tables.arp,
            ndp: tables.ndp,
            routes: tables.routes,
            udp: tables.udp,
            tcp: tables.tcp,
            isn_state: if tables.seed == 0 { 0x6e65_7473 } else { tables.seed },
        }
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.dev
    }

    /// The underlying device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    /// The neighbor table for IPv4.
    pub fn arp_mut(&mut self) -> &mut arp::Cache<'e> {
        &mut self.arp
    }

    /// The neighbor table for IPv6.
    pub fn ndp_mut(&mut self) -> &mut ndp::Cache<'e> {
        &mut self.ndp
    }

    /// The routing tables.
    pub fn routes_mut(&mut self) -> &mut route::Routes<'e> {
        &mut self.routes
    }

    /// Process one received frame of `len` bytes within `frame`.
    ///
    /// The buffer may be larger than the frame; in-place replies that
    /// grow, like neighbor advertisements, use the slack.
    pub fn handle_frame(&mut self, frame: &mut [u8], len: usize) -> Result<()> {
        if len > frame.len() {
            return Err(Error::Truncated);
        }
        let mut ctx = Context {
            dev: &mut self.dev,
            arp: &mut self.arp,
            ndp: &mut self.ndp,
            routes: &mut self.routes,
            udp: &mut self.udp,
            tcp: &mut self.tcp,
            frame,
            len,
            src_mac: EthernetAddress::default(),
            dst_mac: EthernetAddress::default(),
            l3_start: 0,
            src_addr: IpAddress::Unspecified,
            dst_addr: IpAddress::Unspecified,
            l4_start: 0,
            src_port: 0,
            dst_port: 0,
        };
        eth::handle(&mut ctx)
    }

    /// Attach a handler to a UDP port.
    pub fn udp_bind(&mut self, port: u16, handler: udp::Handler) -> Result<()> {
        self.udp.bind(port, handler)
    }

    /// Detach whatever is bound to a UDP port.
    pub fn udp_unbind(&mut self, port: u16) {
        self.udp.unbind(port);
    }

    /// Send one UDP datagram from scattered payload segments.
    pub fn udp_send(
        &mut self,
        dst: IpAddress,
        src_port: u16,
        dst_port: u16,
        payload: &[&[u8]],
    ) -> Result<()> {
        let (mut send, _) = self.split();
        udp::send(&mut send, dst, src_port, dst_port, payload)
    }

    /// Open a TCP connection; the SYN goes out immediately.
    pub fn tcp_connect(
        &mut self,
        remote: IpAddress,
        remote_port: u16,
        local_port: u16,
    ) -> Result<tcp::Handle> {
        let iss = TcpSeqNumber(self.next_isn());
        let (mut send, endpoint) = self.split();
        endpoint.connect(&mut send, remote, remote_port, local_port, iss)
    }

    /// Queue data on a connection for the next [`Stack::tcp_poll`].
    pub fn tcp_write(&mut self, handle: tcp::Handle, data: &[u8]) -> Result<usize> {
        self.tcp.write(handle, data)
    }

    /// Transmit queued connection data as the peer's window allows.
    pub fn tcp_poll(&mut self, handle: tcp::Handle) -> Result<bool> {
        let (mut send, endpoint) = self.split();
        endpoint.poll(&mut send, handle)
    }

    /// Whether all data written to the connection is sent and
    /// acknowledged.
    pub fn tcp_write_done(&self, handle: tcp::Handle) -> Result<bool> {
        self.tcp.write_done(handle)
    }

    /// Drain received connection data into `buf`.
    pub fn tcp_recv(&mut self, handle: tcp::Handle, buf: &mut [u8]) -> Result<usize> {
        self.tcp.recv(handle, buf)
    }

    /// Close a connection.
    pub fn tcp_close(&mut self, handle: tcp::Handle) -> Result<()> {
        let (mut send, endpoint) = self.split();
        endpoint.close(&mut send, handle)
    }

    /// The state of a connection.
    pub fn tcp_state(&self, handle: tcp::Handle) -> Result<tcp::State> {
        self.tcp.state(handle)
    }

    fn split(&mut self) -> (SendContext<'_, 'e>, &mut tcp::Endpoint<'e>) {
        (
            SendContext {
                dev: &mut self.dev,
                arp: &mut self.arp,
                ndp: &mut self.ndp,
                routes: &mut self.routes,
            },
            &mut self.tcp,
        )
    }

    /// A xorshift step over the seed; cheap, and good enough to keep
    /// initial sequence numbers from repeating between connections.
    fn next_isn(&mut self) -> u32 {
        let mut x = self.isn_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.isn_state = x;
        x
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{self, handle};
    use crate::layer::Error;
    use crate::wire::{
        arp_packet, ethernet_frame, ArpOperation, EtherType, EthernetAddress,
        ARP_PACKET_LEN, ETHERNET_HEADER_LEN,
    };

    fn arp_request_for(target: crate::wire::Ipv4Address) -> Vec<u8> {
        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + ARP_PACKET_LEN];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(EthernetAddress::BROADCAST);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Arp);
        }
        {
            let packet = arp_packet::new_unchecked_mut(&mut frame[ETHERNET_HEADER_LEN..]);
            packet.set_types_ethernet_ipv4();
            packet.set_operation(ArpOperation::Request);
            packet.set_sender_hardware_addr(testing::PEER_MAC);
            packet.set_sender_protocol_addr(testing::PEER_IP);
            packet.set_target_protocol_addr(target);
        }
        frame
    }

    #[test]
    fn arp_request_is_answered_and_learned() {
        let mut stack = testing::stack();
        let mut frame = arp_request_for(testing::IP);
        handle(&mut stack, &mut frame).unwrap();

        let sent = stack.device().sent();
        assert_eq!(sent.len(), 1);
        let reply = &sent[0];
        let eth = ethernet_frame::new_checked(&reply[..]).unwrap();
        assert_eq!(eth.dst_addr(), testing::PEER_MAC);
        assert_eq!(eth.ethertype(), EtherType::Arp);

        let packet = arp_packet::new_checked(&reply[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(packet.operation(), ArpOperation::Reply);
        assert_eq!(packet.sender_hardware_addr(), testing::MAC);
        assert_eq!(packet.sender_protocol_addr(), testing::IP);
        assert_eq!(packet.target_hardware_addr(), testing::PEER_MAC);
        assert_eq!(packet.target_protocol_addr(), testing::PEER_IP);

        // the sender was learned in passing
        assert_eq!(stack.arp_mut().lookup(testing::PEER_IP), Some(testing::PEER_MAC));
    }

    #[test]
    fn arp_request_for_someone_else() {
        let mut stack = testing::stack();
        let mut frame = arp_request_for(crate::wire::Ipv4Address::new(10, 0, 0, 9));
        handle(&mut stack, &mut frame).unwrap();
        assert!(stack.device().sent().is_empty());
    }

    #[test]
    fn unknown_ethertype_is_dropped() {
        let mut stack = testing::stack();
        let mut frame = vec![0u8; 64];
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(testing::MAC);
            eth.set_src_addr(testing::PEER_MAC);
            eth.set_ethertype(EtherType::Unknown(0x88b5));
        }
        assert_eq!(handle(&mut stack, &mut frame), Err(Error::Unrecognized));
        assert!(stack.device().sent().is_empty());
    }

    #[test]
    fn foreign_unicast_frame_is_ignored() {
        let mut stack = testing::stack();
        let mut frame = arp_request_for(testing::IP);
        {
            let eth = ethernet_frame::new_unchecked_mut(&mut frame);
            eth.set_dst_addr(EthernetAddress([2, 0, 0, 0, 0, 9]));
        }
        handle(&mut stack, &mut frame).unwrap();
        assert!(stack.device().sent().is_empty());
    }

    #[test]
    fn isn_generator_varies() {
        let mut stack = testing::stack();
        stack.arp_mut().learn(testing::PEER_IP, testing::PEER_MAC);

        let first = stack
            .tcp_connect(testing::PEER_IP.into(), 80, 40000)
            .unwrap();
        let second = stack
            .tcp_connect(testing::PEER_IP.into(), 80, 40001)
            .unwrap();
        let _ = (first, second);

        let sent = stack.device().sent();
        let seq_of = |frame: &[u8]| {
            crate::wire::tcp_packet::new_checked(&frame[ETHERNET_HEADER_LEN + 20..])
                .unwrap()
                .seq_number()
        };
        assert_ne!(seq_of(&sent[0]), seq_of(&sent[1]));
    }
}
