#![allow(missing_docs)]

use std::collections::BTreeMap;

use flatval::{
    table::{capacity_for, MIN_CAPACITY},
    FlatError, Reader, Value, Writer, WriterOptions,
};
use proptest::prelude::*;

fn open(value: &Value, load: f64) -> Reader {
    let buf = Writer::with_options(WriterOptions::default().max_load_factor(load))
        .serialize(value)
        .expect("serialize");
    Reader::from_bytes(buf).expect("open")
}

#[test]
fn capacities_leave_an_unused_slot() {
    assert_eq!(capacity_for(0, 0.75), Some(MIN_CAPACITY));
    assert_eq!(capacity_for(6, 0.75), Some(8));
    assert_eq!(capacity_for(7, 0.75), Some(16));
    assert_eq!(capacity_for(7, 1.0), Some(8));
    assert_eq!(capacity_for(8, 1.0), Some(16));
    assert_eq!(capacity_for(u32::MAX, 1.0), None);
}

#[test]
fn full_load_tables_still_terminate_misses() {
    let keys: Vec<Value> = (0..7u32).map(Value::U32).collect();
    let reader = open(&Value::Set(keys), 1.0);
    let root = reader.root().unwrap();
    assert_eq!(reader.table_len(root).unwrap(), 7);
    for k in 0..7u32 {
        assert!(reader.set_contains(root, &Value::U32(k)).unwrap());
    }
    for k in 7..64u32 {
        assert!(!reader.set_contains(root, &Value::U32(k)).unwrap());
    }
}

#[test]
fn numeric_keys_collapse_across_kinds() {
    let map = Value::Map(vec![
        (Value::U8(1), Value::from("first")),
        (Value::I64(1), Value::from("second")),
        (Value::F32(1.0), Value::from("third")),
        (Value::I8(-1), Value::from("negative")),
    ]);
    let reader = open(&map, 0.75);
    let root = reader.root().unwrap();
    assert_eq!(reader.table_len(root).unwrap(), 2);
    let hit = reader.map_get(root, &Value::U64(1)).unwrap().unwrap();
    assert_eq!(reader.str(hit).unwrap(), "third");
    let hit = reader.map_get(root, &Value::I32(-1)).unwrap().unwrap();
    assert_eq!(reader.str(hit).unwrap(), "negative");
    assert!(reader.map_get(root, &Value::from("1")).unwrap().is_none());
}

#[test]
fn containers_work_as_keys() {
    let set_key = Value::Set(vec![Value::from("a"), Value::from("b")]);
    let map_key = Value::Map(vec![(Value::U8(1), Value::Empty)]);
    let vec_key = Value::Vector(vec![Value::U8(1), Value::from("z")]);
    let map = Value::Map(vec![
        (set_key, Value::U8(1)),
        (map_key, Value::U8(2)),
        (vec_key, Value::U8(3)),
        (Value::Map(vec![]), Value::U8(4)),
    ]);
    let reader = open(&map, 0.75);
    let root = reader.root().unwrap();

    let probe = Value::Set(vec![Value::from("b"), Value::from("a"), Value::from("a")]);
    let hit = reader.map_get(root, &probe).unwrap().unwrap();
    assert_eq!(reader.number(hit).unwrap(), flatval::Number::UInt(1));

    let probe = Value::Map(vec![(Value::I64(1), Value::Empty)]);
    assert!(reader.map_get(root, &probe).unwrap().is_some());

    let probe = Value::Vector(vec![Value::I16(1), Value::from("z")]);
    assert!(reader.map_get(root, &probe).unwrap().is_some());

    assert!(reader.map_get(root, &Value::Map(vec![])).unwrap().is_some());
    assert!(reader.map_get(root, &Value::Set(vec![])).unwrap().is_none());
}

#[test]
fn keys_from_the_same_buffer_are_accepted() {
    let inner = Value::Set(vec![Value::from("k"), Value::U8(9)]);
    let doc = Value::Vector(vec![
        Value::Set(vec![inner.clone()]),
        inner,
    ]);
    let reader = open(&doc, 0.75);
    let root = reader.root().unwrap();
    let table = reader.vector_item(root, 0).unwrap();
    let key = reader.vector_item(root, 1).unwrap();
    assert!(reader.set_contains(table, key).unwrap());
    let nine = reader
        .entries(key)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .find(|k| reader.eq_value(*k, &Value::U8(9)).unwrap())
        .unwrap();
    assert!(!reader.set_contains(table, nine).unwrap());
}

#[test]
fn lookups_reject_wrong_kinds_and_unhashable_keys() {
    let reader = open(&Value::Set(vec![Value::U8(1)]), 0.75);
    let root = reader.root().unwrap();
    assert!(matches!(
        reader.map_get(root, &Value::U8(1)),
        Err(FlatError::TypeMismatch { expected: "map", .. })
    ));

    let plain = WriterOptions::default().hashable_vectors(false);
    let buf = Writer::with_options(plain)
        .serialize(&Value::Vector(vec![
            Value::Set(vec![Value::U8(1)]),
            Value::Vector(vec![Value::U8(1)]),
        ]))
        .unwrap();
    let reader = Reader::from_bytes(buf).unwrap();
    let root = reader.root().unwrap();
    let table = reader.vector_item(root, 0).unwrap();
    let key = reader.vector_item(root, 1).unwrap();
    assert!(matches!(
        reader.set_contains(table, key),
        Err(FlatError::Unhashable("vector"))
    ));
}

#[test]
fn invalid_load_factors_are_rejected() {
    for load in [0.0, -0.5, 1.5, f64::NAN] {
        let writer = Writer::with_options(WriterOptions::default().max_load_factor(load));
        assert!(matches!(
            writer.serialize(&Value::Set(vec![Value::U8(1)])),
            Err(FlatError::Invalid(_))
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn inserted_keys_are_found(
        entries in proptest::collection::vec((any::<i64>(), any::<u32>()), 0..200),
        misses in proptest::collection::vec(any::<i64>(), 0..50),
        full in any::<bool>(),
    ) {
        let expected: BTreeMap<i64, u32> = entries.iter().copied().collect();
        let map = Value::Map(
            entries
                .iter()
                .map(|&(k, v)| (Value::I64(k), Value::U32(v)))
                .collect(),
        );
        let reader = open(&map, if full { 1.0 } else { 0.5 });
        let root = reader.root().unwrap();
        prop_assert_eq!(reader.table_len(root).unwrap() as usize, expected.len());
        for (k, v) in &expected {
            let hit = reader.map_get(root, &Value::I64(*k)).unwrap();
            prop_assert_eq!(
                hit.map(|h| reader.number(h).unwrap()),
                Some(flatval::Number::UInt(*v as u64))
            );
        }
        for k in misses.iter().filter(|k| !expected.contains_key(k)) {
            prop_assert!(reader.map_get(root, &Value::I64(*k)).unwrap().is_none());
        }
    }
}
