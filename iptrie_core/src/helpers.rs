//! Bit helpers and key conversions for the trie walk
//!
//! Both families share one key shape: a left-aligned `u128`. An IPv4 address
//! sits in the top 32 bits, so bit `i` means the same thing for either family
//! and one walk serves both widths.

use crate::constants::V4_SHIFT;
use crate::types::Family;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[inline]
pub fn v4_key(addr: u32) -> u128 {
    (addr as u128) << V4_SHIFT
}

#[inline]
pub fn v6_key(addr: u128) -> u128 {
    addr
}

/// Bit `index` (0 = most significant) of a left-aligned key.
#[inline]
pub fn get_bit(key: u128, index: u8) -> u8 {
    debug_assert!(index <= 127);
    ((key >> (127 - index)) & 1) as u8
}

#[inline]
pub fn mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 128 {
        !0u128
    } else {
        !(!0u128 >> prefix_len)
    }
}

// Canonicalise a key: zero host bits beyond `plen`.
#[inline(always)]
pub fn canonical(key: u128, plen: u8) -> u128 {
    key & mask(plen)
}

pub fn addr_key(addr: IpAddr) -> (Family, u128) {
    match addr {
        IpAddr::V4(v4) => (Family::V4, v4_key(u32::from(v4))),
        IpAddr::V6(v6) => (Family::V6, v6_key(u128::from(v6))),
    }
}

/// Family, canonical key and length of a typed prefix.
pub fn net_key(net: &IpNet) -> (Family, u128, u8) {
    let (family, key) = addr_key(net.addr());
    let plen = net.prefix_len();
    (family, canonical(key, plen), plen)
}

/// Rebuild the prefix a node stands for. `plen` never exceeds the family
/// width because nodes only exist at depths a walk actually reached.
pub fn key_to_net(family: Family, key: u128, plen: u8) -> IpNet {
    debug_assert!(plen <= family.bits());
    match family {
        Family::V4 => {
            let addr = Ipv4Addr::from((key >> V4_SHIFT) as u32);
            IpNet::V4(Ipv4Net::new_assert(addr, plen))
        }
        Family::V6 => IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::from(key), plen)),
    }
}
