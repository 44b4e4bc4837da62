//! Static routing tables with longest prefix match.

use crate::managed::{List, Slice};
use crate::wire::{Ipv4Address, Ipv6Address};

use super::{Error, Result};

/// One IPv4 route.
///
/// A route without a next hop covers an on-link prefix; the destination
/// itself is then the next hop. A prefix length of zero is the default
/// route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteV4 {
    pub net: Ipv4Address,
    pub prefix_len: u8,
    pub next_hop: Option<Ipv4Address>,
}

/// One IPv6 route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteV6 {
    pub net: Ipv6Address,
    pub prefix_len: u8,
    pub next_hop: Option<Ipv6Address>,
}

/// The routing tables for both address families.
#[derive(Debug)]
pub struct Routes<'e> {
    v4: List<'e, RouteV4>,
    v6: List<'e, RouteV6>,
}

impl<'e> Routes<'e> {
    /// Create tables over the given route storage.
    pub fn new<C4, C6>(v4: C4, v6: C6) -> Self
        where C4: Into<Slice<'e, RouteV4>>, C6: Into<Slice<'e, RouteV6>>
    {
        Routes {
            v4: List::new(v4.into()),
            v6: List::new(v6.into()),
        }
    }

    /// Add an IPv4 route.
    pub fn add_v4(&mut self, route: RouteV4) -> Result<()> {
        match self.v4.push() {
            Some(slot) => {
                *slot = route;
                Ok(())
            }
            None => Err(Error::Exhausted),
        }
    }

    /// Add an IPv6 route.
    pub fn add_v6(&mut self, route: RouteV6) -> Result<()> {
        match self.v6.push() {
            Some(slot) => {
                *slot = route;
                Ok(())
            }
            None => Err(Error::Exhausted),
        }
    }

    /// Find the next hop towards an IPv4 destination.
    ///
    /// The most specific matching prefix wins.
    pub fn lookup_v4(&self, dst: Ipv4Address) -> Option<Ipv4Address> {
        self.v4.iter()
            .filter(|route| dst.matches_prefix(route.net, route.prefix_len))
            .max_by_key(|route| route.prefix_len)
            .map(|route| route.next_hop.unwrap_or(dst))
    }

    /// Find the next hop towards an IPv6 destination.
    ///
    /// Link-local destinations are always on-link and need no route.
    pub fn lookup_v6(&self, dst: &Ipv6Address) -> Option<Ipv6Address> {
        if dst.is_link_local() || dst.is_multicast() {
            return Some(*dst);
        }
        self.v6.iter()
            .filter(|route| dst.matches_prefix(&route.net, route.prefix_len))
            .max_by_key(|route| route.prefix_len)
            .map(|route| route.next_hop.unwrap_or(*dst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let mut routes = Routes::new(vec![RouteV4::default(); 4], Slice::empty());
        let gw = Ipv4Address::new(10, 0, 0, 1);
        let other_gw = Ipv4Address::new(10, 0, 0, 254);

        routes.add_v4(RouteV4 {
            net: Ipv4Address::UNSPECIFIED, prefix_len: 0, next_hop: Some(gw),
        }).unwrap();
        routes.add_v4(RouteV4 {
            net: Ipv4Address::new(10, 0, 0, 0), prefix_len: 24, next_hop: None,
        }).unwrap();
        routes.add_v4(RouteV4 {
            net: Ipv4Address::new(10, 0, 1, 0), prefix_len: 24, next_hop: Some(other_gw),
        }).unwrap();

        // on-link prefix returns the destination itself
        let on_link = Ipv4Address::new(10, 0, 0, 7);
        assert_eq!(routes.lookup_v4(on_link), Some(on_link));
        // more specific beats the default route
        assert_eq!(routes.lookup_v4(Ipv4Address::new(10, 0, 1, 7)), Some(other_gw));
        // everything else goes to the gateway
        assert_eq!(routes.lookup_v4(Ipv4Address::new(8, 8, 8, 8)), Some(gw));
    }

    #[test]
    fn no_route_no_hop() {
        let routes = Routes::new(Slice::empty(), Slice::empty());
        assert_eq!(routes.lookup_v4(Ipv4Address::new(8, 8, 8, 8)), None);
    }

    #[test]
    fn link_local_is_on_link() {
        let routes = Routes::new(Slice::empty(), Slice::empty());
        let dst = Ipv6Address::link_local_from_iid([0, 0, 0, 0xff, 0xfe, 0, 0, 9]);
        assert_eq!(routes.lookup_v6(&dst), Some(dst));
    }

    #[test]
    fn table_capacity_is_hard() {
        let mut routes = Routes::new(vec![RouteV4::default(); 1], Slice::empty());
        routes.add_v4(RouteV4::default()).unwrap();
        assert_eq!(routes.add_v4(RouteV4::default()), Err(Error::Exhausted));
    }
}
