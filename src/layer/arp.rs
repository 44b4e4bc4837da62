//! Address resolution for IPv4 over Ethernet.

use crate::managed::{List, Slice};
use crate::nic::Device;
use crate::wire::{
    arp_packet, ArpOperation, EtherType, EthernetAddress, Ipv4Address,
    ARP_PACKET_LEN, ETHERNET_HEADER_LEN,
};

use super::{Context, Error, Result};

/// The resolution state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// A request has been broadcast, no answer yet.
    Requested,
    /// The link address is known.
    Resolved(EthernetAddress),
}

impl Default for Mapping {
    fn default() -> Self {
        Mapping::Requested
    }
}

/// One address translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entry {
    ipv4: Ipv4Address,
    mapping: Mapping,
}

/// The neighbor table for IPv4.
///
/// Entries are never evicted. A full table fails hard on new misses so
/// that the operator sizes the storage for the actual neighborhood
/// instead of the stack silently thrashing it.
#[derive(Debug)]
pub struct Cache<'e> {
    entries: List<'e, Entry>,
}

impl<'e> Cache<'e> {
    /// Create a cache over the given entry storage.
    pub fn new<C>(entries: C) -> Self
        where C: Into<Slice<'e, Entry>>
    {
        Cache { entries: List::new(entries.into()) }
    }

    /// Look up a finished translation.
    pub fn lookup(&self, ipv4: Ipv4Address) -> Option<EthernetAddress> {
        self.entries.iter().find_map(|entry| match entry.mapping {
            Mapping::Resolved(mac) if entry.ipv4 == ipv4 => Some(mac),
            _ => None,
        })
    }

    /// Record a translation learned from received traffic.
    ///
    /// Updates an existing entry in place, completing a pending request
    /// if one is outstanding. Learning into a full table is a no-op;
    /// only an active resolve reports exhaustion.
    pub fn learn(&mut self, ipv4: Ipv4Address, mac: EthernetAddress) {
        if ipv4.is_unspecified() || !mac.is_unicast() {
            return;
        }
        for entry in self.entries.iter_mut() {
            if entry.ipv4 == ipv4 {
                entry.mapping = Mapping::Resolved(mac);
                return;
            }
        }
        match self.entries.push() {
            Some(entry) => *entry = Entry { ipv4, mapping: Mapping::Resolved(mac) },
            None => net_debug!("arp: table full, not learning {}", ipv4),
        }
    }

    /// Resolve an address, soliciting it over the wire on a miss.
    ///
    /// A miss broadcasts exactly one request: the entry is parked in
    /// [`Mapping::Requested`] and later calls return [`Error::Unresolved`]
    /// without transmitting again until a reply arrives.
    pub fn resolve(
        &mut self,
        dev: &mut dyn Device,
        ipv4: Ipv4Address,
    ) -> Result<EthernetAddress> {
        for entry in self.entries.iter() {
            if entry.ipv4 == ipv4 {
                return match entry.mapping {
                    Mapping::Resolved(mac) => Ok(mac),
                    Mapping::Requested => Err(Error::Unresolved),
                };
            }
        }

        match self.entries.push() {
            Some(entry) => *entry = Entry { ipv4, mapping: Mapping::Requested },
            None => {
                net_debug!("arp: table full, can not resolve {}", ipv4);
                return Err(Error::Exhausted);
            }
        }

        request(dev, ipv4)?;
        Err(Error::Unresolved)
    }
}

/// Broadcast one request for `target`.
fn request(dev: &mut dyn Device, target: Ipv4Address) -> Result<()> {
    let mut buffer = [0u8; ARP_PACKET_LEN];
    {
        let packet = arp_packet::new_unchecked_mut(&mut buffer);
        packet.set_types_ethernet_ipv4();
        packet.set_operation(ArpOperation::Request);
        packet.set_sender_hardware_addr(dev.link_addr());
        packet.set_sender_protocol_addr(dev.ipv4_addr());
        packet.set_target_hardware_addr(EthernetAddress::default());
        packet.set_target_protocol_addr(target);
    }
    net_trace!("arp: who-has {}", target);
    dev.send(EthernetAddress::BROADCAST, EtherType::Arp, &[&buffer])?;
    Ok(())
}

/// Process a received packet.
///
/// The sender mapping is learned opportunistically from both requests
/// and replies. A request for our own address is answered by rewriting
/// the packet in place.
pub fn handle(ctx: &mut Context) -> Result<()> {
    let own_addr = ctx.dev.ipv4_addr();
    let own_mac = ctx.dev.link_addr();

    let (operation, sender_mac, sender_ip, target_ip) = {
        let packet = arp_packet::new_checked(&ctx.frame[ctx.l3_start..ctx.len])?;
        packet.check_types()?;
        (
            packet.operation(),
            packet.sender_hardware_addr(),
            packet.sender_protocol_addr(),
            packet.target_protocol_addr(),
        )
    };

    ctx.arp.learn(sender_ip, sender_mac);

    match operation {
        ArpOperation::Request if target_ip == own_addr => {
            {
                let packet =
                    arp_packet::new_unchecked_mut(&mut ctx.frame[ctx.l3_start..ctx.len]);
                packet.set_operation(ArpOperation::Reply);
                packet.set_target_hardware_addr(sender_mac);
                packet.set_target_protocol_addr(sender_ip);
                packet.set_sender_hardware_addr(own_mac);
                packet.set_sender_protocol_addr(own_addr);
            }
            net_trace!("arp: {} is-at {}", own_addr, own_mac);
            ctx.len = ETHERNET_HEADER_LEN + ARP_PACKET_LEN;
            ctx.reply()
        }
        ArpOperation::Request => Ok(()),
        ArpOperation::Reply => Ok(()),
        ArpOperation::Unknown(_) => Err(Error::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nic::Loopback;

    const OWN_MAC: EthernetAddress = EthernetAddress([2, 0, 0, 0, 0, 1]);
    const OWN_IP: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
    const PEER_IP: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);
    const PEER_MAC: EthernetAddress = EthernetAddress([2, 0, 0, 0, 0, 2]);

    #[test]
    fn miss_broadcasts_once() {
        let mut dev = Loopback::new(OWN_MAC, OWN_IP);
        let mut cache = Cache::new(vec![Entry::default(); 4]);

        assert_eq!(cache.resolve(&mut dev, PEER_IP), Err(Error::Unresolved));
        assert_eq!(dev.sent().len(), 1);

        // further misses for the same address stay quiet
        assert_eq!(cache.resolve(&mut dev, PEER_IP), Err(Error::Unresolved));
        assert_eq!(dev.sent().len(), 1);

        cache.learn(PEER_IP, PEER_MAC);
        assert_eq!(cache.resolve(&mut dev, PEER_IP), Ok(PEER_MAC));
        assert_eq!(dev.sent().len(), 1);
    }

    #[test]
    fn full_table_is_an_error() {
        let mut dev = Loopback::new(OWN_MAC, OWN_IP);
        let mut cache = Cache::new(vec![Entry::default(); 1]);

        assert_eq!(cache.resolve(&mut dev, PEER_IP), Err(Error::Unresolved));
        assert_eq!(
            cache.resolve(&mut dev, Ipv4Address::new(10, 0, 0, 3)),
            Err(Error::Exhausted)
        );
        // the failed resolve did not transmit
        assert_eq!(dev.sent().len(), 1);
    }

    #[test]
    fn learning_into_full_table_is_best_effort() {
        let mut cache = Cache::new(vec![Entry::default(); 1]);
        cache.learn(PEER_IP, PEER_MAC);
        cache.learn(Ipv4Address::new(10, 0, 0, 3), EthernetAddress([2, 0, 0, 0, 0, 3]));
        assert_eq!(cache.lookup(PEER_IP), Some(PEER_MAC));
        assert_eq!(cache.lookup(Ipv4Address::new(10, 0, 0, 3)), None);
    }
}
