#![allow(missing_docs)]

use std::cmp::Ordering;

use flatval::{
    format::{tag, Cell, Header, HEADER_LEN, VERSION},
    validate,
    value::hash::{self, SeqHasher},
    FlatError, Number, Reader, Value,
};

const DEPTH: u32 = 40;

fn put(rec: &mut Vec<u8>, v: u32) {
    rec.extend_from_slice(&v.to_le_bytes());
}

fn finish(records: &[u8], n_containers: u32, root: Cell) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN];
    buf.extend_from_slice(records);
    Header {
        version: VERSION,
        flags: 0,
        n_containers,
        root,
        checksum: 0,
        total_len: buf.len() as u32,
    }
    .encode(&mut buf);
    buf
}

/// Hashable vectors where level 0 holds `leaf` and level `k` holds level
/// `k - 1` twice, so the expanded tree has `2^depth` leaves. Records start
/// at `base` and take container ids `first_id..=first_id + depth`.
///
/// Returns the record bytes, the offset of the top level and its hash.
fn doubling_chain(base: u32, first_id: u32, depth: u32, leaf: u8) -> (Vec<u8>, u32, u32) {
    let mut rec = Vec::new();
    put(&mut rec, first_id);
    put(&mut rec, 1);
    Cell::new(tag::U8, leaf as u32).put(&mut rec);
    let mut h = SeqHasher::new();
    h.push(hash::number(Number::UInt(leaf as u64)));
    let mut level_hash = h.finish();
    let mut top = base;
    for k in 1..=depth {
        let below = top;
        top = base + rec.len() as u32;
        put(&mut rec, first_id + k);
        put(&mut rec, 2);
        Cell::new(tag::VECTOR_VALUE_HASHABLE, below).put(&mut rec);
        Cell::new(tag::VECTOR_VALUE_HASHABLE, below).put(&mut rec);
        let mut h = SeqHasher::new();
        h.push(level_hash);
        h.push(level_hash);
        level_hash = h.finish();
    }
    (rec, top, level_hash)
}

/// A one-element set at offset 32 whose element is the top of a doubling
/// chain.
fn set_of_chain(depth: u32) -> (Vec<u8>, u32) {
    let set_len = 12 + 8 * 4 + 8 * 8;
    let (chain, top, top_hash) = doubling_chain(32 + set_len, 1, depth, 7);
    let home = top_hash & 7;
    let mut rec = Vec::new();
    put(&mut rec, 0);
    put(&mut rec, 1);
    put(&mut rec, 8);
    for slot in 0..8 {
        put(&mut rec, if slot == home { top_hash } else { 0 });
    }
    for slot in 0..8 {
        let cell = if slot == home {
            Cell::new(tag::VECTOR_VALUE_HASHABLE, top)
        } else {
            Cell::new(tag::UNUSED_SLOT, 0)
        };
        cell.put(&mut rec);
    }
    rec.extend_from_slice(&chain);
    (finish(&rec, depth + 2, Cell::new(tag::SET, 32)), top_hash)
}

#[test]
fn shared_set_keys_validate_in_linear_time() {
    let (buf, top_hash) = set_of_chain(DEPTH);
    let summary = validate(&buf).unwrap();
    assert_eq!(summary.n_sets, 1);
    assert_eq!(summary.n_vectors, DEPTH as u64 + 1);
    // root, its key, two visits per doubling level, the leaf
    assert_eq!(summary.n_values, 2 + 2 * DEPTH as u64 + 1);

    let reader = Reader::from_bytes(buf).unwrap();
    let root = reader.root().unwrap();
    let (key, _) = reader.entries(root).unwrap().next().unwrap().unwrap();
    assert_eq!(reader.hash(key).unwrap(), top_hash);
    assert!(reader.set_contains(root, key).unwrap());
    let half = reader.slice(key, 0, 1).unwrap();
    assert!(!reader.set_contains(root, half).unwrap());
}

#[test]
fn corrupted_shared_key_hash_is_still_detected() {
    let (mut buf, top_hash) = set_of_chain(DEPTH);
    let slot_hash_at = HEADER_LEN + 12 + (top_hash & 7) as usize * 4;
    buf[slot_hash_at..slot_hash_at + 4].copy_from_slice(&(top_hash ^ 1).to_le_bytes());
    assert!(matches!(
        Reader::from_bytes(buf),
        Err(FlatError::Validation(_))
    ));
}

#[test]
fn shared_structures_compare_without_expanding() {
    let chain_len = 16 + 24 * DEPTH;
    let base = 32 + 8 + 3 * 8;
    let (a, a_top, _) = doubling_chain(base, 1, DEPTH, 7);
    let (b, b_top, _) = doubling_chain(base + chain_len, DEPTH + 2, DEPTH, 7);
    let (c, c_top, _) = doubling_chain(base + 2 * chain_len, 2 * DEPTH + 3, DEPTH, 9);
    let mut rec = Vec::new();
    put(&mut rec, 0);
    put(&mut rec, 3);
    for top in [a_top, b_top, c_top] {
        Cell::new(tag::VECTOR_VALUE_HASHABLE, top).put(&mut rec);
    }
    rec.extend_from_slice(&a);
    rec.extend_from_slice(&b);
    rec.extend_from_slice(&c);
    let buf = finish(
        &rec,
        3 * DEPTH + 4,
        Cell::new(tag::VECTOR_VALUE_HASHABLE, 32),
    );

    let reader = Reader::from_bytes(buf).unwrap();
    let root = reader.root().unwrap();
    let a = reader.vector_item(root, 0).unwrap();
    let b = reader.vector_item(root, 1).unwrap();
    let c = reader.vector_item(root, 2).unwrap();
    assert_ne!(reader.container_id(a).unwrap(), reader.container_id(b).unwrap());
    assert!(reader.eq(a, b).unwrap());
    assert_eq!(reader.compare(a, b).unwrap(), Ordering::Equal);
    assert_eq!(reader.hash(a).unwrap(), reader.hash(b).unwrap());
    assert!(!reader.eq(a, c).unwrap());
    assert_eq!(reader.compare(a, c).unwrap(), Ordering::Less);
    assert_eq!(reader.compare(c, b).unwrap(), Ordering::Greater);
    assert!(!reader.eq_value(a, &Value::Vector(vec![])).unwrap());
}
