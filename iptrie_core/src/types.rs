//! Data structures for the prefix trie

use crate::constants::{ROOT_ID, V4_BITS, V6_BITS};
use std::fmt;

/// Address family. Each family gets its own sub-trie; they share no nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::V4, Family::V6];

    /// Key width in bits: 32 or 128.
    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            Family::V4 => V4_BITS,
            Family::V6 => V6_BITS,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => f.write_str("IPv4"),
            Family::V6 => f.write_str("IPv6"),
        }
    }
}

/// Arena slot of a node inside one family's sub-trie.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) const ROOT: NodeId = NodeId(ROOT_ID);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One bit boundary of the trie.
#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    pub key: u128,                      // canonical, left-aligned
    pub prefix_len: u8,                 // depth == valid bits in key
    pub value: Option<V>,               // Some only where a prefix was inserted
    pub children: [Option<NodeId>; 2],  // [bit 0, bit 1]
    pub parent: Option<NodeId>,         // back-reference, never owning
}

impl<V> Node<V> {
    pub fn new(key: u128, prefix_len: u8, parent: Option<NodeId>) -> Self {
        Self {
            key,
            prefix_len,
            value: None,
            children: [None, None],
            parent,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children[0].is_none() && self.children[1].is_none()
    }

    /// Neither a value nor anything below it: safe to prune.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.value.is_none() && self.is_leaf()
    }
}

/// How an enumeration ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Walk {
    /// Every entry was visited.
    Completed,
    /// The callback asked to stop early.
    Stopped,
}
