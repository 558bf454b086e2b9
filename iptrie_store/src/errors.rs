//! Snapshot error type

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum StoreError {
    /// The byte stream is not a well-formed snapshot.
    CorruptSnapshot(String),
    /// A record decoded fine but its prefix text is not valid for its family.
    InvalidPrefix(String),
    /// A value could not be serialized on save.
    Encode(serde_json::Error),
    Io(io::Error),
    Trie(iptrie_core::Error),
}

impl StoreError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        StoreError::CorruptSnapshot(msg.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CorruptSnapshot(msg) => write!(f, "corrupt snapshot: {msg}"),
            StoreError::InvalidPrefix(p) => write!(f, "invalid prefix in snapshot: {p:?}"),
            StoreError::Encode(e) => write!(f, "value encode failed: {e}"),
            StoreError::Io(e) => write!(f, "snapshot i/o: {e}"),
            StoreError::Trie(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Encode(e) => Some(e),
            StoreError::Io(e) => Some(e),
            StoreError::Trie(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        // a short read means the stream ended inside a record
        if e.kind() == io::ErrorKind::UnexpectedEof {
            StoreError::corrupt("truncated stream")
        } else {
            StoreError::Io(e)
        }
    }
}

impl From<iptrie_core::Error> for StoreError {
    fn from(e: iptrie_core::Error) -> Self {
        match e {
            iptrie_core::Error::InvalidPrefix(p) => StoreError::InvalidPrefix(p),
            other => StoreError::Trie(other),
        }
    }
}
