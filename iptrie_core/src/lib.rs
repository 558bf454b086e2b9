pub mod constants;
pub mod errors;
pub mod family;
pub mod helpers;
pub mod public_api;
pub mod telemetry;
pub mod types;

pub use errors::{Error, ErrorCode};
pub use family::{Ancestors, FamilyTrie, Iter, NodeRef};
pub use ipnet::IpNet;
pub use types::{Family, Walk};

use helpers::*;
use log::{debug, info};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::net::IpAddr;
use std::ops::ControlFlow;

/// Longest-prefix-match table for IPv4 and IPv6 prefixes.
///
/// The two families live in separate sub-tries. Mutation takes `&mut self`;
/// callers that share a tree across threads wrap it in their own lock.
#[derive(Debug, Clone)]
pub struct IpTree<V> {
    v4: FamilyTrie<V>,
    v6: FamilyTrie<V>,
}

impl<V> Default for IpTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IpTree<V> {
    // ---- logging bootstraper -------------------------------------------------
    fn ensure_logging() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            // plain env_logger, timestamps off
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
        });
    }

    pub fn new() -> Self {
        Self::ensure_logging();
        telemetry::init();
        Self {
            v4: FamilyTrie::new(Family::V4),
            v6: FamilyTrie::new(Family::V6),
        }
    }

    #[inline]
    pub fn family(&self, family: Family) -> &FamilyTrie<V> {
        match family {
            Family::V4 => &self.v4,
            Family::V6 => &self.v6,
        }
    }

    #[inline]
    fn family_mut(&mut self, family: Family) -> &mut FamilyTrie<V> {
        match family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        }
    }

    /// Bind `value` to `net`. Host bits past the prefix length are ignored.
    ///
    /// With `overwrite == false` an existing binding is kept and the call
    /// fails with [`Error::DuplicatePrefix`]; otherwise the previous value is
    /// replaced and returned.
    pub fn insert_with(&mut self, net: IpNet, value: V, overwrite: bool) -> Result<Option<V>, Error> {
        counter!("iptrie_inserts_total").increment(1);
        info!("[INSERT] prefix={}, overwrite={}", net.trunc(), overwrite);
        let (family, key, plen) = net_key(&net);
        let res = self.family_mut(family).insert(key, plen, value, overwrite);
        if let Err(ref e) = res {
            counter!("iptrie_duplicate_rejections_total").increment(1);
            debug!("[INSERT] rejected: {}", e);
        }
        res
    }

    /// Insert without overwrite.
    pub fn insert(&mut self, net: IpNet, value: V) -> Result<(), Error> {
        self.insert_with(net, value, false).map(|_| ())
    }

    /// Insert with overwrite, returning the replaced value if any.
    pub fn replace(&mut self, net: IpNet, value: V) -> Option<V> {
        counter!("iptrie_inserts_total").increment(1);
        info!("[INSERT] prefix={}, overwrite=true", net.trunc());
        let (family, key, plen) = net_key(&net);
        self.family_mut(family).upsert(key, plen, value)
    }

    /// Exact match: the value bound to precisely this prefix.
    pub fn get(&self, net: &IpNet) -> Option<&V> {
        let (family, key, plen) = net_key(net);
        self.family(family).get(key, plen)
    }

    pub fn get_mut(&mut self, net: &IpNet) -> Option<&mut V> {
        let (family, key, plen) = net_key(net);
        self.family_mut(family).get_mut(key, plen)
    }

    pub fn contains(&self, net: &IpNet) -> bool {
        self.get(net).is_some()
    }

    /// Longest-prefix match, returning the matching node for parent-chain
    /// queries.
    pub fn find(&self, addr: IpAddr) -> Option<NodeRef<'_, V>> {
        let (family, key) = addr_key(addr);
        let trie = self.family(family);
        trie.longest(key).map(|id| trie.node_ref(id))
    }

    /// Longest-prefix match: the most specific registered prefix containing
    /// `addr`, with its value.
    pub fn longest_match(&self, addr: IpAddr) -> Option<(IpNet, &V)> {
        let m = self.find(addr)?;
        Some((m.prefix(), m.value()?))
    }

    /// Value of the longest registered prefix containing `addr`.
    pub fn lookup(&self, addr: IpAddr) -> Option<&V> {
        self.find(addr).and_then(|m| m.value())
    }

    /// Remove the exact prefix. Broader prefixes start matching again for
    /// the addresses it used to cover.
    pub fn remove(&mut self, net: &IpNet) -> Result<V, Error> {
        info!("[DELETE] prefix={}", net.trunc());
        let (family, key, plen) = net_key(net);
        let value = self.family_mut(family).remove(key, plen)?;
        counter!("iptrie_deletes_total").increment(1);
        Ok(value)
    }

    /// Lazy depth-first enumeration of one family. Calling it again restarts.
    pub fn iter(&self, family: Family) -> Iter<'_, V> {
        self.family(family).iter()
    }

    /// Every entry, IPv4 first.
    pub fn entries(&self) -> impl Iterator<Item = (IpNet, &V)> + '_ {
        self.v4.iter().chain(self.v6.iter())
    }

    /// Visit each entry of `family` until the callback breaks.
    pub fn walk<F>(&self, family: Family, mut f: F) -> Walk
    where
        F: FnMut(IpNet, &V) -> ControlFlow<()>,
    {
        for (net, value) in self.iter(family) {
            if f(net, value).is_break() {
                debug!("[WALK] {} stopped by caller at {}", family, net);
                return Walk::Stopped;
            }
        }
        Walk::Completed
    }

    /// Like [`walk`](Self::walk) with a fallible callback. The first error
    /// aborts the walk and is returned as-is.
    pub fn try_walk<F, E>(&self, family: Family, mut f: F) -> Result<Walk, E>
    where
        F: FnMut(IpNet, &V) -> Result<ControlFlow<()>, E>,
    {
        for (net, value) in self.iter(family) {
            if f(net, value)?.is_break() {
                return Ok(Walk::Stopped);
            }
        }
        Ok(Walk::Completed)
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn len_of(&self, family: Family) -> usize {
        self.family(family).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_count(&self, family: Family) -> usize {
        self.family(family).node_count()
    }

    /// Drop every entry of both families.
    pub fn clear(&mut self) {
        info!("[CLEAR] Clearing tree.");
        self.v4.clear();
        self.v6.clear();
    }

    /// Emit gauges (caller decides cadence).
    pub fn report_metrics(&self) {
        gauge!("iptrie_prefixes").set(self.len() as f64);
        gauge!("iptrie_nodes").set((self.v4.node_count() + self.v6.node_count()) as f64);
    }
}

impl<V> FromIterator<(IpNet, V)> for IpTree<V> {
    fn from_iter<I: IntoIterator<Item = (IpNet, V)>>(iter: I) -> Self {
        let mut tree = IpTree::new();
        tree.extend(iter);
        tree
    }
}

/// Later pairs overwrite earlier ones with the same prefix.
impl<V> Extend<(IpNet, V)> for IpTree<V> {
    fn extend<I: IntoIterator<Item = (IpNet, V)>>(&mut self, iter: I) {
        for (net, value) in iter {
            self.replace(net, value);
        }
    }
}
