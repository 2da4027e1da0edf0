#![allow(missing_docs)]

use std::path::PathBuf;

use flatval::{
    bitvec, BitVector, Bits, Number, OpenOptions, PrimKind, PrimVector, Reader, Scalar, Value,
    ValueKind, Writer, WriterOptions,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn document() -> Value {
    let mut runs = BitVector::zeros(5).expect("zeros");
    runs.extend_true(11).expect("ones");
    Value::Map(vec![
        (Value::from("title"), Value::from("quarterly report")),
        (Value::from("count"), Value::U64(u64::MAX)),
        (Value::from("delta"), Value::I64(i64::MIN)),
        (Value::from("ratio"), Value::F32(0.25)),
        (Value::from("ok"), Value::Bool(true)),
        (Value::from("nothing"), Value::Empty),
        (Value::from("runs"), Value::BitVector(runs)),
        (
            Value::from("mixed"),
            Value::BitVector(
                BitVector::from_bools([true, false, false, true, true]).expect("bits"),
            ),
        ),
        (
            Value::from("samples"),
            Value::PrimVector(
                PrimVector::from_numbers(
                    PrimKind::F32,
                    [1.5f32, -2.0, 8.25].into_iter().map(Number::Float),
                )
                .expect("floats"),
            ),
        ),
        (
            Value::from("rows"),
            Value::Vector(vec![
                Value::Vector(vec![Value::U8(1), Value::from("one")]),
                Value::Vector(vec![Value::U8(2), Value::from("two")]),
                Value::Vector(vec![]),
            ]),
        ),
        (
            Value::from("index"),
            Value::Map(vec![
                (Value::Set(vec![Value::from("a"), Value::from("b")]), Value::U8(1)),
                (Value::Map(vec![]), Value::U8(2)),
            ]),
        ),
    ])
}

fn write_document(name: &str, opts: WriterOptions) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.flv"));
    Writer::with_options(opts)
        .write_file(&document(), &path)
        .expect("write buffer");
    (dir, path)
}

#[test]
fn written_documents_read_back_identically() {
    let (_dir, path) = write_document("roundtrip", WriterOptions::default());
    for use_mmap in [true, false] {
        let reader = OpenOptions::default()
            .use_mmap(use_mmap)
            .open(&path)
            .expect("open");
        let root = reader.root().expect("root");
        assert_eq!(root.kind(), ValueKind::Map);
        assert_eq!(reader.to_value(root).expect("materialize"), document());

        let count = reader
            .map_get(root, &Value::from("count"))
            .expect("lookup")
            .expect("present");
        assert_eq!(
            reader.scalar(count).expect("scalar"),
            Scalar::Number(Number::UInt(u64::MAX))
        );
        let nothing = reader
            .map_get(root, &Value::from("nothing"))
            .expect("lookup")
            .expect("present");
        assert_eq!(reader.scalar(nothing).expect("scalar"), Scalar::Empty);
    }
}

#[test]
fn buffers_are_position_independent() {
    let buf = Writer::new().serialize(&document()).expect("serialize");
    let mut shifted = vec![0xAAu8; 3];
    shifted.extend_from_slice(&buf);
    let moved = shifted[3..].to_vec();
    let a = Reader::from_bytes(buf).expect("open original");
    let b = Reader::from_bytes(moved).expect("open moved copy");
    assert_eq!(
        a.to_value(a.root().unwrap()).unwrap(),
        b.to_value(b.root().unwrap()).unwrap()
    );
    assert_eq!(a.hash(a.root().unwrap()).unwrap(), b.hash(b.root().unwrap()).unwrap());
}

#[test]
fn nested_rows_are_reachable_in_place() {
    let reader = Reader::from_bytes(Writer::new().serialize(&document()).unwrap()).unwrap();
    let root = reader.root().unwrap();
    let rows = reader.map_get(root, &Value::from("rows")).unwrap().unwrap();
    assert_eq!(reader.vector_len(rows).unwrap(), 3);
    let second = reader.vector_item(rows, 1).unwrap();
    let label = reader.vector_item(second, 1).unwrap();
    assert_eq!(reader.str(label).unwrap(), "two");
    assert!(reader.is_hashable(rows).unwrap());
    let row = Value::Vector(vec![Value::I32(1), Value::from("one")]);
    assert!(reader.contains(rows, &row).unwrap());
    let empty = reader.vector_item(rows, 2).unwrap();
    assert_eq!(reader.container_id(empty).unwrap(), None);
    assert!(reader.container_id(rows).unwrap().is_some());
    assert_ne!(
        reader.container_id(rows).unwrap(),
        reader.container_id(second).unwrap()
    );

    let index = reader.map_get(root, &Value::from("index")).unwrap().unwrap();
    let by_set = Value::Set(vec![Value::from("b"), Value::from("a"), Value::from("a")]);
    let hit = reader.map_get(index, &by_set).unwrap().unwrap();
    assert_eq!(reader.number(hit).unwrap(), Number::UInt(1));
    let hit = reader.map_get(index, &Value::Map(vec![])).unwrap().unwrap();
    assert_eq!(reader.number(hit).unwrap(), Number::UInt(2));
}

#[test]
fn mapped_bit_vectors_hash_like_owned_ones() {
    let reader = Reader::from_bytes(Writer::new().serialize(&document()).unwrap()).unwrap();
    let root = reader.root().unwrap();
    for key in ["runs", "mixed"] {
        let v = reader.map_get(root, &Value::from(key)).unwrap().unwrap();
        let mapped = reader.bitvector(v).unwrap();
        let Value::BitVector(owned) = reader.to_value(v).unwrap() else {
            panic!("{key} is not a bit vector");
        };
        assert!(mapped.is_read_only());
        assert_eq!(mapped.hash_32(), owned.hash_32());
        assert_eq!(mapped.hash_64(), owned.hash_64());
        assert_eq!(mapped, Bits::Owned(owned));
    }
    let runs = reader.map_get(root, &Value::from("runs")).unwrap().unwrap();
    assert!(!reader.is_set(runs, 4).unwrap());
    assert!(reader.is_set(runs, 5).unwrap());
    assert!(reader.is_set(runs, 15).unwrap());
}

#[test]
fn unhashable_vectors_round_trip_but_cannot_be_keys() {
    let opts = WriterOptions::default().hashable_vectors(false);
    let value = Value::Vector(vec![Value::Vector(vec![Value::U8(1)])]);
    let buf = Writer::with_options(opts.clone()).serialize(&value).unwrap();
    let reader = Reader::from_bytes(buf).unwrap();
    let root = reader.root().unwrap();
    assert!(!reader.is_hashable(root).unwrap());
    assert!(matches!(
        reader.hash(root),
        Err(flatval::FlatError::Unhashable("vector"))
    ));
    let keyed = Value::Map(vec![(value, Value::Empty)]);
    assert!(Writer::with_options(opts).serialize(&keyed).is_err());
}

#[test]
fn ordering_follows_value_semantics() {
    let value = Value::Vector(vec![
        Value::from("apple"),
        Value::from("banana"),
        Value::I8(-3),
        Value::U64(3),
        Value::BitVector(BitVector::from_bools([true, false]).unwrap()),
        Value::BitVector(BitVector::from_bools([true, false, false]).unwrap()),
    ]);
    let reader = Reader::from_bytes(Writer::new().serialize(&value).unwrap()).unwrap();
    let root = reader.root().unwrap();
    let at = |i| reader.vector_item(root, i).unwrap();
    use std::cmp::Ordering::*;
    assert_eq!(reader.compare(at(0), at(1)).unwrap(), Less);
    assert_eq!(reader.compare(at(3), at(2)).unwrap(), Greater);
    assert_eq!(reader.compare(at(4), at(5)).unwrap(), Less);
    assert!(!reader.eq(at(4), at(5)).unwrap());
    assert!(reader.compare(at(0), at(2)).is_err());
    assert!(!reader.eq(at(0), at(2)).unwrap());
}

proptest! {
    #[test]
    fn integer_vectors_round_trip(items in proptest::collection::vec(any::<i64>(), 0..64)) {
        let value = Value::Vector(items.iter().copied().map(Value::I64).collect());
        let reader = Reader::from_bytes(Writer::new().serialize(&value).unwrap()).unwrap();
        let root = reader.root().unwrap();
        prop_assert_eq!(reader.vector_len(root).unwrap() as usize, items.len());
        for (i, want) in items.iter().enumerate() {
            let got = reader.number(reader.vector_item(root, i as u32).unwrap()).unwrap();
            prop_assert_eq!(got, Number::Int(*want));
        }
        prop_assert_eq!(reader.hash(root).unwrap(), value.hash());
    }

    #[test]
    fn bit_hashes_ignore_storage(bits in proptest::collection::vec(any::<bool>(), 0..200)) {
        let owned = BitVector::from_bools(bits.iter().copied()).unwrap();
        let reader = Reader::from_bytes(
            Writer::new().serialize(&Value::BitVector(owned.clone())).unwrap(),
        )
        .unwrap();
        let mapped = reader.bitvector(reader.root().unwrap()).unwrap();
        prop_assert_eq!(mapped.hash_32(), bitvec::hash_32(&owned));
        prop_assert_eq!(mapped.hash_64(), bitvec::hash_64(&owned));
        prop_assert_eq!(mapped.len(), owned.len());
    }
}
