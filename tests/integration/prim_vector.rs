#![allow(missing_docs)]

use flatval::{
    primitives::dynarray::{next_capacity, DynArray},
    FlatError, Number, PrimKind, PrimVector, ProjectionColumn,
};
use proptest::prelude::*;

fn filled(kind: PrimKind, n: usize) -> PrimVector {
    let values = (0..n).map(|i| {
        let x = (i % 100) as u8;
        if kind.is_float() {
            Number::Float(x as f32 / 4.0)
        } else {
            Number::UInt(x as u64)
        }
    });
    PrimVector::from_numbers(kind, values).expect("values fit every kind")
}

#[test]
fn blobs_roundtrip_for_every_kind() {
    for kind in PrimKind::ALL {
        for n in [0, 1, 1000] {
            let v = filled(kind, n);
            let blob = v.serialize();
            assert_eq!(blob.len(), 8 + n * kind.item_size(), "{kind} x {n}");
            let back = PrimVector::deserialize(&blob).unwrap();
            assert_eq!(back.kind(), kind);
            assert_eq!(back.as_bytes(), v.as_bytes());
            assert_eq!(back, v);
        }
    }
}

#[test]
fn malformed_blobs_are_rejected() {
    let blob = filled(PrimKind::I32, 3).serialize();
    assert!(matches!(
        PrimVector::deserialize(&blob[..6]),
        Err(FlatError::InvalidBlob(_))
    ));
    assert!(matches!(
        PrimVector::deserialize(&blob[..blob.len() - 1]),
        Err(FlatError::InvalidBlob(_))
    ));
    let mut unknown = blob.clone();
    unknown[0..4].copy_from_slice(&99u32.to_le_bytes());
    assert!(matches!(
        PrimVector::deserialize(&unknown),
        Err(FlatError::InvalidBlob("unknown type tag"))
    ));
    let mut huge = blob;
    huge[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(PrimVector::deserialize(&huge).is_err());
}

#[test]
fn exports_block_resizing_until_released() {
    let mut v = filled(PrimKind::U16, 4);
    let guard = v.export();
    assert_eq!(v.as_bytes().len(), 8);
    assert!(matches!(
        v.push(Number::UInt(1)),
        Err(FlatError::ResizeWhileBorrowed)
    ));
    assert!(matches!(v.pop(), Err(FlatError::ResizeWhileBorrowed)));
    assert!(matches!(v.clear(), Err(FlatError::ResizeWhileBorrowed)));
    assert!(matches!(v.remove(0), Err(FlatError::ResizeWhileBorrowed)));
    v.set(0, Number::UInt(42)).unwrap();
    assert_eq!(v.len(), 4);

    let mut copy = v.clone();
    copy.push(Number::UInt(7)).unwrap();

    drop(guard);
    v.push(Number::UInt(9)).unwrap();
    assert_eq!(v.len(), 5);
    assert_eq!(v.get(0).unwrap(), Number::UInt(42));
}

#[test]
fn projection_sort_orders_indices_by_column() {
    let mut idx = PrimVector::from_numbers(PrimKind::I32, [2, 0, 1].map(Number::Int)).unwrap();
    let col =
        PrimVector::from_numbers(PrimKind::F32, [30.0, 10.0, 20.0].map(Number::Float)).unwrap();
    idx.sort_projection(&[&col]).unwrap();
    let got: Vec<_> = idx.iter().collect();
    assert_eq!(got, [1, 2, 0].map(Number::Int));
}

#[test]
fn projection_sort_compares_signed_and_unsigned_by_value() {
    let mut idx =
        PrimVector::from_numbers(PrimKind::U32, [0u64, 1, 2, 3].map(Number::UInt)).unwrap();
    let signed =
        PrimVector::from_numbers(PrimKind::I64, [-5, 3, 3, -5].map(Number::Int)).unwrap();
    let unsigned =
        PrimVector::from_numbers(PrimKind::U64, [u64::MAX, 1, 0, 7].map(Number::UInt)).unwrap();
    idx.sort_projection(&[&signed, &unsigned]).unwrap();
    let got: Vec<_> = idx.iter().collect();
    assert_eq!(got, [3u64, 0, 2, 1].map(Number::UInt));
}

#[test]
fn projection_sort_rejects_bad_input() {
    let col = filled(PrimKind::I8, 3);
    let mut out_of_range = PrimVector::from_numbers(PrimKind::I8, [0, 3].map(Number::Int)).unwrap();
    assert!(matches!(
        out_of_range.sort_projection(&[&col]),
        Err(FlatError::Bounds { .. })
    ));
    let mut negative = PrimVector::from_numbers(PrimKind::I8, [-1].map(Number::Int)).unwrap();
    assert!(negative.sort_projection(&[&col]).is_err());

    let mut floats = filled(PrimKind::F32, 2);
    assert!(matches!(
        floats.sort_projection(&[&col]),
        Err(FlatError::TypeMismatch { .. })
    ));

    let mut idx = filled(PrimKind::U8, 2);
    let short = filled(PrimKind::I8, 2);
    assert!(matches!(
        idx.sort_projection(&[&col, &short]),
        Err(FlatError::Invalid(_))
    ));
    assert!(matches!(idx.sort_projection(&[]), Err(FlatError::Invalid(_))));
}

#[test]
fn dynarray_growth_follows_the_capacity_sequence() {
    let mut arr = DynArray::new(2);
    let mut last = arr.capacity();
    for i in 0..5000u16 {
        arr.push(&i.to_le_bytes()).unwrap();
        assert!(arr.n_items() <= arr.capacity());
        if arr.capacity() != last {
            assert_eq!(Some(arr.capacity()), next_capacity(last));
            last = arr.capacity();
        }
        assert_eq!(arr.n_heap_bytes(), arr.capacity() * 2);
    }
    assert_eq!(arr.item_at(4999), &4999u16.to_le_bytes());
    assert_eq!(next_capacity(0), Some(1));
    assert!(next_capacity(usize::MAX).is_none());
}

proptest! {
    #[test]
    fn sorting_is_ordered_and_idempotent(
        values in proptest::collection::vec(any::<i16>(), 0..300),
    ) {
        let mut v = PrimVector::from_numbers(
            PrimKind::I16,
            values.iter().map(|&x| Number::Int(x as i64)),
        ).unwrap();
        v.sort();
        let once: Vec<Number> = v.iter().collect();
        prop_assert!(once.windows(2).all(|w| w[0].sort_cmp(w[1]).is_le()));
        let mut expected = values.clone();
        expected.sort_unstable();
        let expected: Vec<Number> = expected.iter().map(|&x| Number::Int(x as i64)).collect();
        prop_assert_eq!(once.clone(), expected);
        v.sort();
        prop_assert_eq!(v.iter().collect::<Vec<_>>(), once);
    }

    #[test]
    fn projection_yields_a_permutation(column in proptest::collection::vec(any::<u8>(), 1..100)) {
        let col = PrimVector::from_numbers(
            PrimKind::U8,
            column.iter().map(|&x| Number::UInt(x as u64)),
        ).unwrap();
        let n = col.len();
        let mut idx = PrimVector::from_numbers(
            PrimKind::I64,
            (0..n as i64).rev().map(Number::Int),
        ).unwrap();
        idx.sort_projection(&[&col]).unwrap();
        let order: Vec<usize> = idx.iter().map(|x| x.as_i128().unwrap() as usize).collect();
        let mut seen = order.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());
        for w in order.windows(2) {
            let (a, b) = (col.number_at(w[0]), col.number_at(w[1]));
            prop_assert!(a.sort_cmp(b).is_lt() || (a.sort_cmp(b).is_eq() && w[0] < w[1]));
        }
    }
}
