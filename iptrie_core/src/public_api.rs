//! Textual entry points.
//!
//! Everything here parses and validates text, then hands a typed key to
//! [`IpTree`]. Malformed input never reaches the trie.

use crate::{
    constants::MAX_PREFIX_TEXT_LEN, errors::Error, helpers::addr_key, Family, IpTree, Walk,
};
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::ops::ControlFlow;

#[inline]
fn checked(s: &str) -> Result<&str, Error> {
    let s = s.trim();
    if s.is_empty() || s.len() > MAX_PREFIX_TEXT_LEN {
        return Err(Error::InvalidPrefix(s.to_owned()));
    }
    Ok(s)
}

/// Parse `"addr/len"` or a bare address (taken as a full-length prefix).
pub fn parse_prefix(s: &str) -> Result<IpNet, Error> {
    let s = checked(s)?;
    if let Ok(net) = s.parse::<IpNet>() {
        Ok(net)
    } else if let Ok(ip) = s.parse::<IpAddr>() {
        let (family, _) = addr_key(ip);
        IpNet::new(ip, family.bits()).map_err(|_| Error::InvalidPrefix(s.to_owned()))
    } else {
        Err(Error::InvalidPrefix(s.to_owned()))
    }
}

/// Parse a lookup address. A CIDR is accepted too; its address part is used.
pub fn parse_addr(s: &str) -> Result<IpAddr, Error> {
    let s = checked(s)?;
    if let Ok(ip) = s.parse::<IpAddr>() {
        Ok(ip)
    } else if let Ok(net) = s.parse::<IpNet>() {
        Ok(net.addr())
    } else {
        Err(Error::InvalidPrefix(s.to_owned()))
    }
}

impl<V> IpTree<V> {
    pub fn insert_str(&mut self, prefix: &str, value: V) -> Result<(), Error> {
        self.insert(parse_prefix(prefix)?, value)
    }

    pub fn replace_str(&mut self, prefix: &str, value: V) -> Result<Option<V>, Error> {
        Ok(self.replace(parse_prefix(prefix)?, value))
    }

    /// Exact match on textual prefix.
    pub fn get_str(&self, prefix: &str) -> Result<Option<&V>, Error> {
        Ok(self.get(&parse_prefix(prefix)?))
    }

    /// Longest-prefix match on a textual address.
    pub fn lookup_str(&self, addr: &str) -> Result<Option<&V>, Error> {
        Ok(self.lookup(parse_addr(addr)?))
    }

    pub fn remove_str(&mut self, prefix: &str) -> Result<V, Error> {
        self.remove(&parse_prefix(prefix)?)
    }

    /// [`walk`](IpTree::walk) with the prefix rendered as text.
    pub fn walk_str<F>(&self, family: Family, mut f: F) -> Walk
    where
        F: FnMut(&str, &V) -> ControlFlow<()>,
    {
        self.walk(family, |net, value| f(&net.to_string(), value))
    }

    /// Every entry of both families keyed by its textual prefix.
    pub fn get_all(&self) -> HashMap<String, V>
    where
        V: Clone,
    {
        self.entries()
            .map(|(net, value)| (net.to_string(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_forms() {
        assert_eq!(parse_prefix("10.0.0.0/8").unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(parse_prefix("1.2.3.4").unwrap().to_string(), "1.2.3.4/32");
        assert_eq!(parse_prefix(" 2001:db8::/32 ").unwrap().to_string(), "2001:db8::/32");
        assert_eq!(parse_prefix("::1").unwrap().prefix_len(), 128);
    }

    #[test]
    fn rejects_garbage_and_long_lengths() {
        for bad in ["", "banana", "1.2.3.4/33", "2001:db8::/129", "1.2.3/8", "1.2.3.4/-1"] {
            assert!(
                matches!(parse_prefix(bad), Err(Error::InvalidPrefix(_))),
                "accepted {bad:?}"
            );
        }
        let long = "1".repeat(MAX_PREFIX_TEXT_LEN + 1);
        assert!(parse_addr(&long).is_err());
    }

    #[test]
    fn addr_forms() {
        assert_eq!(parse_addr("1.2.3.4").unwrap().to_string(), "1.2.3.4");
        assert_eq!(parse_addr("1.2.3.4/24").unwrap().to_string(), "1.2.3.4");
        assert!(parse_addr("1.2.3.4.5").is_err());
    }
}
