//! A software device that records what it would transmit.

use crate::wire::{
    ethernet_frame, EtherType, EthernetAddress, Ipv4Address, Ipv6Address,
    ETHERNET_HEADER_LEN,
};

use super::{Device, Error, Result};

/// A device backed by a list of captured frames.
///
/// Mostly useful in tests: every transmitted frame is kept in order and
/// can be inspected afterwards.
#[derive(Debug, Clone)]
pub struct Loopback {
    link_addr: EthernetAddress,
    ipv4_addr: Ipv4Address,
    ipv6_link_local: Ipv6Address,
    ipv6_global: Option<Ipv6Address>,
    mtu: usize,
    sent: Vec<Vec<u8>>,
}

impl Loopback {
    /// Create a device with the given link and IPv4 addresses.
    ///
    /// The IPv6 link-local address is derived from the hardware address
    /// with the usual `fffe` infix.
    pub fn new(link_addr: EthernetAddress, ipv4_addr: Ipv4Address) -> Self {
        let mac = link_addr.0;
        let iid = [
            mac[0] ^ 0x02, mac[1], mac[2], 0xff, 0xfe, mac[3], mac[4], mac[5],
        ];
        Loopback {
            link_addr,
            ipv4_addr,
            ipv6_link_local: Ipv6Address::link_local_from_iid(iid),
            ipv6_global: None,
            mtu: 1500,
            sent: Vec::new(),
        }
    }

    /// Configure a global IPv6 address.
    pub fn set_ipv6_global(&mut self, addr: Ipv6Address) {
        self.ipv6_global = Some(addr);
    }

    /// The frames transmitted so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Forget all captured frames.
    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Device for Loopback {
    fn link_addr(&self) -> EthernetAddress {
        self.link_addr
    }

    fn ipv4_addr(&self) -> Ipv4Address {
        self.ipv4_addr
    }

    fn ipv6_link_local(&self) -> Ipv6Address {
        self.ipv6_link_local
    }

    fn ipv6_global(&self) -> Option<Ipv6Address> {
        self.ipv6_global
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn send(
        &mut self,
        dst: EthernetAddress,
        ethertype: EtherType,
        chunks: &[&[u8]],
    ) -> Result<()> {
        let payload_len: usize = chunks.iter().map(|chunk| chunk.len()).sum();
        if payload_len > self.mtu {
            return Err(Error::Exhausted);
        }

        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + payload_len];
        {
            let header = ethernet_frame::new_unchecked_mut(&mut frame);
            header.set_dst_addr(dst);
            header.set_src_addr(self.link_addr);
            header.set_ethertype(ethertype);
        }
        let mut at = ETHERNET_HEADER_LEN;
        for chunk in chunks {
            frame[at..at + chunk.len()].copy_from_slice(chunk);
            at += chunk.len();
        }

        self.sent.push(frame);
        Ok(())
    }

    fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > ETHERNET_HEADER_LEN + self.mtu {
            return Err(Error::Exhausted);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_frames() {
        let mut dev = Loopback::new(
            EthernetAddress([2, 0, 0, 0, 0, 1]),
            Ipv4Address::new(10, 0, 0, 1),
        );
        dev.send(EthernetAddress::BROADCAST, EtherType::Arp, &[&[1, 2], &[3]])
            .unwrap();

        assert_eq!(dev.sent().len(), 1);
        let frame = ethernet_frame::new_checked(&dev.sent()[0][..]).unwrap();
        assert_eq!(frame.dst_addr(), EthernetAddress::BROADCAST);
        assert_eq!(frame.src_addr(), EthernetAddress([2, 0, 0, 0, 0, 1]));
        assert_eq!(frame.ethertype(), EtherType::Arp);
        assert_eq!(frame.payload_slice(), &[1, 2, 3]);
    }
}
