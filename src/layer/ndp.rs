//! The neighbor table for IPv6.
//!
//! Unlike its ARP counterpart this table never solicits on its own:
//! entries are seeded by configuration or learned from received
//! solicitations. Answering advertisements is a recognized gap; see
//! `handle` in the ICMPv6 layer.

use crate::managed::{List, Slice};
use crate::wire::{EthernetAddress, Ipv6Address};

use super::{Error, Result};

/// One neighbor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Entry {
    addr: Ipv6Address,
    mac: EthernetAddress,
}

/// The neighbor table.
#[derive(Debug)]
pub struct Cache<'e> {
    entries: List<'e, Entry>,
}

impl<'e> Cache<'e> {
    /// Create a table over the given entry storage.
    pub fn new<C>(entries: C) -> Self
        where C: Into<Slice<'e, Entry>>
    {
        Cache { entries: List::new(entries.into()) }
    }

    /// Insert or refresh a neighbor.
    pub fn add(&mut self, addr: Ipv6Address, mac: EthernetAddress) -> Result<()> {
        for entry in self.entries.iter_mut() {
            if entry.addr == addr {
                entry.mac = mac;
                return Ok(());
            }
        }
        match self.entries.push() {
            Some(entry) => {
                *entry = Entry { addr, mac };
                Ok(())
            }
            None => Err(Error::Exhausted),
        }
    }

    /// Record a neighbor learned from received traffic, best effort.
    pub fn learn(&mut self, addr: Ipv6Address, mac: EthernetAddress) {
        if addr.is_unspecified() || !mac.is_unicast() {
            return;
        }
        let _ = self.add(addr, mac);
    }

    /// Look up the link address of a neighbor.
    pub fn lookup(&self, addr: &Ipv6Address) -> Option<EthernetAddress> {
        self.entries.iter()
            .find(|entry| entry.addr == *addr)
            .map(|entry| entry.mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_refresh_lookup() {
        let mut cache = Cache::new(vec![Entry::default(); 2]);
        let addr = Ipv6Address::link_local_from_iid([0, 0, 0, 0xff, 0xfe, 0, 0, 2]);
        let first = EthernetAddress([2, 0, 0, 0, 0, 2]);
        let second = EthernetAddress([2, 0, 0, 0, 0, 3]);

        cache.add(addr, first).unwrap();
        assert_eq!(cache.lookup(&addr), Some(first));

        // refresh does not burn a second slot
        cache.add(addr, second).unwrap();
        assert_eq!(cache.lookup(&addr), Some(second));
        assert!(cache.add(Ipv6Address::UNSPECIFIED, first).is_ok());
        assert_eq!(
            cache.add(
                Ipv6Address::link_local_from_iid([0; 8]),
                first,
            ),
            Err(Error::Exhausted)
        );
    }
}
