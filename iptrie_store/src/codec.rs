//! Snapshot wire format.
//!
//! ```text
//! magic    "IPTS"
//! record*  tag u8 (4 | 6) | text_len u8 | prefix text | value_len u32 | value (JSON) | crc32 u32
//! end      tag u8 = 0 | record_count u64
//! ```
//!
//! Integers are little-endian. The CRC covers every record byte before it.
//! Record order is whatever enumeration yields and carries no meaning.

use crate::errors::StoreError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use iptrie_core::{public_api::parse_prefix, Family, IpNet, IpTree};
use log::{debug, info, warn};
use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{self, Read, Write};

pub const MAGIC: [u8; 4] = *b"IPTS";

pub(crate) const TAG_END: u8 = 0;
pub(crate) const TAG_V4: u8 = 4;
pub(crate) const TAG_V6: u8 = 6;

fn family_tag(family: Family) -> u8 {
    match family {
        Family::V4 => TAG_V4,
        Family::V6 => TAG_V6,
    }
}

fn family_of(net: &IpNet) -> Family {
    match net {
        IpNet::V4(_) => Family::V4,
        IpNet::V6(_) => Family::V6,
    }
}

/// Append one framed record to `buf`.
fn write_record<V: Serialize>(
    buf: &mut Vec<u8>,
    family: Family,
    net: &IpNet,
    value: &V,
) -> Result<(), StoreError> {
    let text = net.to_string();
    let payload = serde_json::to_vec(value).map_err(StoreError::Encode)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        StoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("value of {text} is {} bytes", payload.len()),
        ))
    })?;
    // longest rendering is a full IPv6 /128, well under 255
    debug_assert!(text.len() <= u8::MAX as usize);

    buf.write_u8(family_tag(family))?;
    buf.write_u8(text.len() as u8)?;
    buf.extend_from_slice(text.as_bytes());
    buf.write_u32::<LittleEndian>(payload_len)?;
    buf.extend_from_slice(&payload);
    let crc = crc32fast::hash(buf);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(())
}

/// Write every entry of `tree` to `w`. Returns the number of records.
pub fn encode<V, W>(tree: &IpTree<V>, mut w: W) -> Result<u64, StoreError>
where
    V: Serialize,
    W: Write,
{
    w.write_all(&MAGIC)?;
    let mut count = 0u64;
    let mut rec = Vec::with_capacity(64);
    for family in Family::ALL {
        for (net, value) in tree.iter(family) {
            rec.clear();
            write_record(&mut rec, family, &net, value)?;
            w.write_all(&rec)?;
            count += 1;
        }
    }
    w.write_u8(TAG_END)?;
    w.write_u64::<LittleEndian>(count)?;
    w.flush()?;
    counter!("iptrie_snapshot_records_written_total").increment(count);
    info!("[SAVE] wrote {} records", count);
    Ok(count)
}

/// Read one record body; the tag byte has already been consumed.
fn read_record<V, R>(r: &mut R, tag: u8, family: Family) -> Result<(IpNet, V), StoreError>
where
    V: DeserializeOwned,
    R: Read,
{
    let text_len = r.read_u8()?;
    let mut text = vec![0u8; text_len as usize];
    r.read_exact(&mut text)?;
    let value_len = r.read_u32::<LittleEndian>()?;
    let mut payload = Vec::new();
    // grow as bytes arrive rather than trusting the length up front
    r.by_ref().take(value_len as u64).read_to_end(&mut payload)?;
    if payload.len() != value_len as usize {
        return Err(StoreError::corrupt("truncated value"));
    }
    let crc = r.read_u32::<LittleEndian>()?;

    let mut hasher = Crc32::new();
    hasher.update(&[tag, text_len]);
    hasher.update(&text);
    hasher.update(&value_len.to_le_bytes());
    hasher.update(&payload);
    if hasher.finalize() != crc {
        return Err(StoreError::corrupt("record checksum mismatch"));
    }

    let text = std::str::from_utf8(&text)
        .map_err(|_| StoreError::corrupt("prefix text is not UTF-8"))?;
    let net = parse_prefix(text)?;
    if family_of(&net) != family {
        return Err(StoreError::InvalidPrefix(format!(
            "{text} is not an {family} prefix"
        )));
    }
    let value = serde_json::from_slice(&payload)
        .map_err(|e| StoreError::corrupt(format!("value of {text}: {e}")))?;
    debug!("[LOAD] {} ({} value bytes)", net, value_len);
    Ok((net, value))
}

fn decode_inner<V, R>(mut r: R) -> Result<IpTree<V>, StoreError>
where
    V: DeserializeOwned,
    R: Read,
{
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(StoreError::corrupt("bad magic"));
    }

    let mut tree = IpTree::new();
    let mut read = 0u64;
    loop {
        let tag = r.read_u8()?;
        let family = match tag {
            TAG_END => break,
            TAG_V4 => Family::V4,
            TAG_V6 => Family::V6,
            other => {
                return Err(StoreError::corrupt(format!(
                    "unknown record tag {other:#04x} after {read} records"
                )))
            }
        };
        let (net, value) = read_record(&mut r, tag, family)?;
        tree.replace(net, value);
        read += 1;
    }

    let expected = r.read_u64::<LittleEndian>()?;
    if expected != read {
        return Err(StoreError::corrupt(format!(
            "end marker says {expected} records, found {read}"
        )));
    }
    let mut trailing = [0u8; 1];
    if r.read(&mut trailing)? != 0 {
        return Err(StoreError::corrupt("trailing bytes after end marker"));
    }
    counter!("iptrie_snapshot_records_read_total").increment(read);
    info!("[LOAD] restored {} records", read);
    Ok(tree)
}

/// Rebuild a tree from `r`. Records are inserted with overwrite. On any
/// error the partially built tree is dropped.
pub fn decode<V, R>(r: R) -> Result<IpTree<V>, StoreError>
where
    V: DeserializeOwned,
    R: Read,
{
    decode_inner(r).map_err(|e| {
        warn!("[LOAD] snapshot rejected: {}", e);
        e
    })
}
