//! Save and restore [`IpTree`]s.
//!
//! A snapshot is the flat list of `(prefix, value)` pairs of both families.
//! Loading replays them through ordinary insertion, so the restored tree is
//! equivalent to the saved one whatever order the records come in.

pub mod codec;
pub mod errors;

pub use codec::{decode, encode, MAGIC};
pub use errors::StoreError;

use iptrie_core::IpTree;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn to_bytes<V: Serialize>(tree: &IpTree<V>) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    encode(tree, &mut out)?;
    Ok(out)
}

pub fn from_bytes<V: DeserializeOwned>(bytes: &[u8]) -> Result<IpTree<V>, StoreError> {
    decode(bytes)
}

/// Write `tree` to `path`, replacing any existing file. Returns the record
/// count.
pub fn save_to_file<V, P>(tree: &IpTree<V>, path: P) -> Result<u64, StoreError>
where
    V: Serialize,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    let count = encode(tree, &mut w)?;
    w.get_ref().sync_all()?;
    Ok(count)
}

pub fn load_from_file<V, P>(path: P) -> Result<IpTree<V>, StoreError>
where
    V: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}
