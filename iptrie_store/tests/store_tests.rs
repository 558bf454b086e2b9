use byteorder::{LittleEndian, WriteBytesExt};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use iptrie_core::{Family, IpTree};
use iptrie_store::{from_bytes, load_from_file, save_to_file, to_bytes, StoreError, MAGIC};
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn sorted<V: Clone>(tree: &IpTree<V>) -> BTreeMap<IpNet, V> {
    tree.entries().map(|(n, v)| (n, v.clone())).collect()
}

/// Hand-framed record with a valid checksum.
fn record(tag: u8, text: &str, value: &[u8]) -> Vec<u8> {
    let mut rec = Vec::new();
    rec.write_u8(tag).unwrap();
    rec.write_u8(text.len() as u8).unwrap();
    rec.extend_from_slice(text.as_bytes());
    rec.write_u32::<LittleEndian>(value.len() as u32).unwrap();
    rec.extend_from_slice(value);
    let crc = crc32fast::hash(&rec);
    rec.write_u32::<LittleEndian>(crc).unwrap();
    rec
}

fn snapshot(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    for r in records {
        out.extend_from_slice(r);
    }
    out.write_u8(0).unwrap();
    out.write_u64::<LittleEndian>(records.len() as u64).unwrap();
    out
}

#[test]
fn empty_tree_round_trip() {
    let tree: IpTree<u32> = IpTree::new();
    let bytes = to_bytes(&tree).unwrap();
    assert_eq!(&bytes[..4], b"IPTS");
    assert_eq!(bytes.len(), 4 + 1 + 8);
    let back: IpTree<u32> = from_bytes(&bytes).unwrap();
    assert!(back.is_empty());
    assert_eq!(back.node_count(Family::V4), 1);
    assert_eq!(back.node_count(Family::V6), 1);
}

#[test]
fn v4_round_trip_preserves_lookups() {
    let mut tree = IpTree::new();
    tree.insert(net("0.0.0.0/0"), 0).unwrap();
    tree.insert(net("141.212.120.0/24"), 3).unwrap();
    tree.insert(net("141.212.120.15/32"), 1).unwrap();

    let back: IpTree<i32> = from_bytes(&to_bytes(&tree).unwrap()).unwrap();
    assert_eq!(sorted(&back), sorted(&tree));
    assert_eq!(back.lookup(ip("1.2.3.4")), Some(&0));
    assert_eq!(back.lookup(ip("141.212.120.14")), Some(&3));
    assert_eq!(back.lookup(ip("141.212.120.15")), Some(&1));
}

#[test]
fn single_entry_layout() {
    let mut tree = IpTree::new();
    tree.insert(net("10.0.0.0/8"), 7u8).unwrap();
    let bytes = to_bytes(&tree).unwrap();
    assert_eq!(bytes, snapshot(&[record(4, "10.0.0.0/8", b"7")]));
}

#[test]
fn mixed_families_round_trip() {
    let mut tree = IpTree::new();
    for (i, p) in ["10.0.0.0/8", "192.168.1.0/24", "2001:db8::/32", "2001:db8:1::/48", "::/0"]
        .iter()
        .enumerate()
    {
        tree.insert(net(p), format!("v{i}")).unwrap();
    }
    let back: IpTree<String> = from_bytes(&to_bytes(&tree).unwrap()).unwrap();
    assert_eq!(back.len_of(Family::V4), 2);
    assert_eq!(back.len_of(Family::V6), 3);
    assert_eq!(sorted(&back), sorted(&tree));
    assert_eq!(back.lookup(ip("2001:db8:1::5")).map(String::as_str), Some("v3"));
    assert_eq!(back.lookup(ip("2001:db9::1")).map(String::as_str), Some("v4"));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Route {
    asn: u32,
    tags: Vec<String>,
    note: Option<String>,
}

#[test]
fn structured_values_round_trip() {
    let mut tree = IpTree::new();
    tree.insert(
        net("203.0.113.0/24"),
        Route { asn: 64500, tags: vec!["edge".into(), "eu".into()], note: None },
    )
    .unwrap();
    tree.insert(
        net("2001:db8::/32"),
        Route { asn: 64501, tags: vec![], note: Some("doc range".into()) },
    )
    .unwrap();
    let back: IpTree<Route> = from_bytes(&to_bytes(&tree).unwrap()).unwrap();
    assert_eq!(sorted(&back), sorted(&tree));
}

#[test]
fn file_round_trip() {
    let path = std::env::temp_dir().join(format!("iptrie_store_{}.snap", std::process::id()));
    let mut tree = IpTree::new();
    tree.insert(net("172.16.0.0/12"), 12u16).unwrap();
    tree.insert(net("fc00::/7"), 7u16).unwrap();

    assert_eq!(save_to_file(&tree, &path).unwrap(), 2);
    let back: IpTree<u16> = load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(sorted(&back), sorted(&tree));

    // save replaces an existing file
    let path2 = std::env::temp_dir().join(format!("iptrie_store_{}_b.snap", std::process::id()));
    save_to_file(&tree, &path2).unwrap();
    save_to_file(&IpTree::<u16>::new(), &path2).unwrap();
    let back: IpTree<u16> = load_from_file(&path2).unwrap();
    std::fs::remove_file(&path2).ok();
    assert!(back.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let path = std::env::temp_dir().join(format!("iptrie_store_{}_missing.snap", std::process::id()));
    match load_from_file::<u32, _>(&path) {
        Err(StoreError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn load_overwrites_duplicate_records() {
    let bytes = snapshot(&[record(4, "10.0.0.0/8", b"1"), record(4, "10.0.0.0/8", b"2")]);
    let tree: IpTree<u32> = from_bytes(&bytes).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(&net("10.0.0.0/8")), Some(&2));
}

#[test]
fn record_order_does_not_matter() {
    let a = snapshot(&[record(6, "2001:db8::/32", b"1"), record(4, "10.0.0.0/8", b"2")]);
    let b = snapshot(&[record(4, "10.0.0.0/8", b"2"), record(6, "2001:db8::/32", b"1")]);
    let ta: IpTree<u32> = from_bytes(&a).unwrap();
    let tb: IpTree<u32> = from_bytes(&b).unwrap();
    assert_eq!(sorted(&ta), sorted(&tb));
}

fn assert_corrupt(bytes: &[u8]) {
    match from_bytes::<u32>(bytes) {
        Err(StoreError::CorruptSnapshot(_)) => {}
        other => panic!("expected corrupt snapshot, got {other:?}"),
    }
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = snapshot(&[]);
    bytes[0] = b'X';
    assert_corrupt(&bytes);
    assert_corrupt(b"");
}

#[test]
fn checksum_catches_flipped_byte() {
    let good = snapshot(&[record(4, "10.0.0.0/8", b"7")]);
    assert!(from_bytes::<u32>(&good).is_ok());
    // inside the prefix text, then inside the value
    for at in [8, 20] {
        let mut bad = good.clone();
        bad[at] ^= 0x01;
        assert_corrupt(&bad);
    }
}

#[test]
fn every_truncation_is_rejected() {
    let mut tree = IpTree::new();
    tree.insert(net("10.0.0.0/8"), 1).unwrap();
    tree.insert(net("2001:db8::/32"), 2).unwrap();
    let bytes = to_bytes(&tree).unwrap();
    for cut in 0..bytes.len() {
        assert_corrupt(&bytes[..cut]);
    }
}

#[test]
fn end_marker_is_checked() {
    let rec = record(4, "10.0.0.0/8", b"7");

    let mut missing_end = MAGIC.to_vec();
    missing_end.extend_from_slice(&rec);
    assert_corrupt(&missing_end);

    let mut wrong_count = MAGIC.to_vec();
    wrong_count.extend_from_slice(&rec);
    wrong_count.write_u8(0).unwrap();
    wrong_count.write_u64::<LittleEndian>(5).unwrap();
    assert_corrupt(&wrong_count);

    let mut trailing = snapshot(&[rec]);
    trailing.push(0);
    assert_corrupt(&trailing);
}

#[test]
fn unknown_tag_is_rejected() {
    let mut bytes = snapshot(&[record(4, "10.0.0.0/8", b"7")]);
    bytes[4] = 9;
    assert_corrupt(&bytes);
}

#[test]
fn undecodable_value_is_rejected() {
    assert_corrupt(&snapshot(&[record(4, "10.0.0.0/8", b"\"seven\"")]));
}

#[test]
fn bad_prefix_text_is_invalid_prefix() {
    for bytes in [
        snapshot(&[record(4, "10.0.0.0/40", b"1")]),
        snapshot(&[record(4, "not-a-prefix", b"1")]),
        // family tag disagrees with the text
        snapshot(&[record(4, "2001:db8::/32", b"1")]),
        snapshot(&[record(6, "10.0.0.0/8", b"1")]),
    ] {
        match from_bytes::<u32>(&bytes) {
            Err(StoreError::InvalidPrefix(_)) => {}
            other => panic!("expected invalid prefix, got {other:?}"),
        }
    }
}

#[test]
fn failed_load_keeps_nothing() {
    // first record is fine, second is broken
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&record(4, "10.0.0.0/8", b"1"));
    bytes.extend_from_slice(&record(4, "10.0.0.0/99", b"2"));
    assert!(from_bytes::<u32>(&bytes).is_err());
}

fn build(v4: &[(u32, u8, i64)], v6: &[(u128, u8, i64)]) -> IpTree<i64> {
    let mut tree = IpTree::new();
    for &(a, l, v) in v4 {
        let n = Ipv4Net::new(Ipv4Addr::from(a), l).unwrap().trunc();
        tree.replace(IpNet::V4(n), v);
    }
    for &(a, l, v) in v6 {
        let n = Ipv6Net::new(Ipv6Addr::from(a), l).unwrap().trunc();
        tree.replace(IpNet::V6(n), v);
    }
    tree
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_preserves_entries(
        v4 in pvec((any::<u32>(), 0u8..=32, any::<i64>()), 0..40),
        v6 in pvec((any::<u128>(), 0u8..=128, any::<i64>()), 0..40),
        probes in pvec(any::<u32>(), 0..20),
    ) {
        let tree = build(&v4, &v6);
        let bytes = to_bytes(&tree).unwrap();
        let back: IpTree<i64> = from_bytes(&bytes).unwrap();
        prop_assert_eq!(sorted(&back), sorted(&tree));
        for p in probes {
            let a = IpAddr::V4(Ipv4Addr::from(p));
            prop_assert_eq!(back.lookup(a), tree.lookup(a));
        }
    }
}
