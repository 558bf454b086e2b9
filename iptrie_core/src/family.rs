//! One address family's bit trie.
//!
//! Nodes live in an arena (`Vec<Node<V>>`) and point at each other by
//! [`NodeId`]. Slot 0 is the family root, the length-0 boundary, and is never
//! freed. There is no path compression: a node at depth `d` is the boundary
//! after `d` bits, so a walk moves exactly one level per address bit.

use crate::errors::Error;
use crate::helpers::{canonical, get_bit, key_to_net};
use crate::types::{Family, Node, NodeId};
use ipnet::IpNet;
use log::{debug, trace};
use std::fmt;

#[derive(Debug, Clone)]
pub struct FamilyTrie<V> {
    family: Family,
    nodes: Vec<Node<V>>,
    free: Vec<NodeId>,
    len: usize,
}

impl<V> FamilyTrie<V> {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            nodes: vec![Node::new(0, 0, None)],
            free: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Number of prefixes holding a value.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.index()]
    }

    fn alloc_node(&mut self, key: u128, prefix_len: u8, parent: NodeId) -> NodeId {
        let node = Node::new(key, prefix_len, Some(parent));
        if let Some(id) = self.free.pop() {
            trace!("[ALLOC] Reusing freed slot {} for /{}", id.0, prefix_len);
            *self.node_mut(id) = node;
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn free_node(&mut self, id: NodeId) {
        debug_assert!(id != NodeId::ROOT, "family root is never freed");
        *self.node_mut(id) = Node::new(0, 0, None);
        self.free.push(id);
    }

    /// Walk `plen` bits of `key`, creating every missing boundary on the way.
    fn descend_or_create(&mut self, key: u128, plen: u8) -> NodeId {
        let mut cur = NodeId::ROOT;
        for depth in 0..plen {
            let bit = get_bit(key, depth) as usize;
            cur = match self.node(cur).children[bit] {
                Some(child) => child,
                None => {
                    let child = self.alloc_node(canonical(key, depth + 1), depth + 1, cur);
                    self.node_mut(cur).children[bit] = Some(child);
                    child
                }
            };
        }
        cur
    }

    /// Terminal node of an exact `(key, plen)`, if the path exists.
    fn find_exact(&self, key: u128, plen: u8) -> Option<NodeId> {
        let mut cur = NodeId::ROOT;
        for depth in 0..plen {
            cur = self.node(cur).children[get_bit(key, depth) as usize]?;
        }
        Some(cur)
    }

    /// Bind `value` to `(key, plen)`. Without `overwrite`, an existing value
    /// is left alone and the call fails with `DuplicatePrefix`.
    pub fn insert(
        &mut self,
        key: u128,
        plen: u8,
        value: V,
        overwrite: bool,
    ) -> Result<Option<V>, Error> {
        debug_assert!(plen <= self.family.bits());
        let key = canonical(key, plen);
        if !overwrite {
            if let Some(id) = self.find_exact(key, plen) {
                if self.node(id).value.is_some() {
                    return Err(Error::DuplicatePrefix(key_to_net(self.family, key, plen)));
                }
            }
        }
        Ok(self.upsert(key, plen, value))
    }

    /// Bind `value` to `(key, plen)` unconditionally, returning what was there.
    pub fn upsert(&mut self, key: u128, plen: u8, value: V) -> Option<V> {
        let key = canonical(key, plen);
        let before = self.node_count();
        let id = self.descend_or_create(key, plen);
        trace!(
            "[INSERT] {} reached slot {} ({} new nodes)",
            self.family,
            id.0,
            self.node_count() - before
        );
        let prev = self.node_mut(id).value.replace(value);
        if prev.is_none() {
            self.len += 1;
        }
        prev
    }

    pub fn get(&self, key: u128, plen: u8) -> Option<&V> {
        let id = self.find_exact(canonical(key, plen), plen)?;
        self.node(id).value.as_ref()
    }

    pub fn get_mut(&mut self, key: u128, plen: u8) -> Option<&mut V> {
        let id = self.find_exact(canonical(key, plen), plen)?;
        self.node_mut(id).value.as_mut()
    }

    /// Deepest valued node on the path of `key`.
    pub fn longest(&self, key: u128) -> Option<NodeId> {
        let width = self.family.bits();
        let mut cur = NodeId::ROOT;
        let mut best = None;
        let mut depth = 0u8;
        loop {
            let node = self.node(cur);
            if node.value.is_some() {
                best = Some(cur);
            }
            if depth == width {
                break;
            }
            match node.children[get_bit(key, depth) as usize] {
                Some(child) => {
                    cur = child;
                    depth += 1;
                }
                None => break,
            }
        }
        best
    }

    /// Clear the value at `(key, plen)` and prune the dead tail of its path.
    pub fn remove(&mut self, key: u128, plen: u8) -> Result<V, Error> {
        let key = canonical(key, plen);
        let family = self.family;
        let not_found = || Error::PrefixNotFound(key_to_net(family, key, plen));
        let id = self.find_exact(key, plen).ok_or_else(not_found)?;
        let value = self.node_mut(id).value.take().ok_or_else(not_found)?;
        self.len -= 1;
        let pruned = self.prune_from(id);
        debug!(
            "[DELETE] {} cleared, {} nodes pruned",
            key_to_net(family, key, plen),
            pruned
        );
        Ok(value)
    }

    /// Free `id` and its ancestors while they carry neither a value nor a
    /// child. Stops at the first node that still anchors something.
    fn prune_from(&mut self, mut id: NodeId) -> usize {
        let mut pruned = 0;
        while id != NodeId::ROOT && self.node(id).is_dead() {
            let node = self.node(id);
            let parent = match node.parent {
                Some(p) => p,
                None => break,
            };
            let bit = get_bit(node.key, node.prefix_len - 1) as usize;
            self.node_mut(parent).children[bit] = None;
            self.free_node(id);
            pruned += 1;
            id = parent;
        }
        pruned
    }

    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0] = Node::new(0, 0, None);
        self.free.clear();
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            trie: self,
            stack: vec![NodeId::ROOT],
        }
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> NodeRef<'_, V> {
        NodeRef { trie: self, id }
    }
}

/// Depth-first enumeration of the valued nodes of one family.
///
/// Left subtrees come first, so entries appear in ascending address order
/// with shorter prefixes before longer ones at the same address.
pub struct Iter<'a, V> {
    trie: &'a FamilyTrie<V>,
    stack: Vec<NodeId>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (IpNet, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = self.trie.node(id);
            if let Some(right) = node.children[1] {
                self.stack.push(right);
            }
            if let Some(left) = node.children[0] {
                self.stack.push(left);
            }
            if let Some(value) = node.value.as_ref() {
                return Some((key_to_net(self.trie.family, node.key, node.prefix_len), value));
            }
        }
        None
    }
}

/// A node reached by a lookup, with access to its containment chain.
pub struct NodeRef<'a, V> {
    trie: &'a FamilyTrie<V>,
    id: NodeId,
}

impl<V> Clone for NodeRef<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for NodeRef<'_, V> {}

impl<'a, V> NodeRef<'a, V> {
    #[inline]
    fn node(&self) -> &'a Node<V> {
        self.trie.node(self.id)
    }

    pub fn family(&self) -> Family {
        self.trie.family
    }

    /// The prefix this node stands for.
    pub fn prefix(&self) -> IpNet {
        let node = self.node();
        key_to_net(self.trie.family, node.key, node.prefix_len)
    }

    pub fn prefix_len(&self) -> u8 {
        self.node().prefix_len
    }

    /// Bound value; `None` for a purely structural node.
    pub fn value(&self) -> Option<&'a V> {
        self.node().value.as_ref()
    }

    /// Immediate structural parent, one bit shorter. `None` at the family root.
    pub fn parent(&self) -> Option<NodeRef<'a, V>> {
        self.node().parent.map(|id| self.trie.node_ref(id))
    }

    /// Every structural ancestor, nearest first, ending at the family root.
    pub fn ancestors(&self) -> Ancestors<'a, V> {
        Ancestors { next: self.parent() }
    }

    /// Nearest ancestor that holds a value: the next broader registered prefix.
    pub fn covering_parent(&self) -> Option<NodeRef<'a, V>> {
        self.ancestors().find(|n| n.value().is_some())
    }

    /// All broader registered prefixes covering this one, nearest first.
    pub fn covering_parents(&self) -> Vec<NodeRef<'a, V>> {
        self.ancestors().filter(|n| n.value().is_some()).collect()
    }
}

impl<V: fmt::Debug> fmt::Debug for NodeRef<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("prefix", &self.prefix())
            .field("value", &self.value())
            .finish()
    }
}

pub struct Ancestors<'a, V> {
    next: Option<NodeRef<'a, V>>,
}

impl<'a, V> Iterator for Ancestors<'a, V> {
    type Item = NodeRef<'a, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next.take()?;
        self.next = cur.parent();
        Some(cur)
    }
}
