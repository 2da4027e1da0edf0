#![allow(missing_docs)]

use flatval::{
    format::{tag, Cell, Header, HEADER_LEN, VERSION},
    validate, FlatError, OpenOptions, Reader, ValidationError, Value, ValueKind, ValueRef, Writer,
    WriterOptions,
};
use proptest::prelude::*;

fn sample() -> Value {
    Value::Map(vec![
        (Value::from("name"), Value::from("sensor-7")),
        (Value::from("reading"), Value::I64(-40)),
        (
            Value::from("history"),
            Value::Vector(vec![Value::U16(3), Value::F32(2.5), Value::from("x")]),
        ),
        (
            Value::from("labels"),
            Value::Set(vec![Value::from("hot"), Value::from("cold")]),
        ),
    ])
}

fn unchecked(value: &Value) -> Vec<u8> {
    Writer::with_options(WriterOptions::default().checksum(false))
        .serialize(value)
        .expect("serialize")
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Walks everything reachable through the public reader surface.
fn read_everything(reader: &Reader, v: ValueRef) -> flatval::Result<()> {
    match v.kind() {
        ValueKind::String => {
            reader.str(v)?;
        }
        ValueKind::BitVector => {
            let bits = reader.bitvector(v)?;
            bits.iter().count();
            bits.hash_64();
        }
        ValueKind::PrimVector | ValueKind::Vector => {
            for item in reader.iter(v)? {
                read_everything(reader, item?)?;
            }
        }
        ValueKind::Map | ValueKind::Set => {
            for entry in reader.entries(v)? {
                let (key, value) = entry?;
                read_everything(reader, key)?;
                if let Some(value) = value {
                    read_everything(reader, value)?;
                }
            }
        }
        _ => {
            reader.scalar(v)?;
        }
    }
    let _ = reader.hash(v);
    Ok(())
}

#[test]
fn truncated_buffers_are_rejected() {
    let buf = unchecked(&sample());
    for len in [0, 7, HEADER_LEN - 1, HEADER_LEN, buf.len() - 1] {
        let err = validate(&buf[..len]).unwrap_err();
        assert!(matches!(err, ValidationError::BadHeader(_)), "len {len}: {err}");
    }
}

#[test]
fn offsets_past_the_end_are_rejected() {
    let mut buf = unchecked(&Value::from("payload"));
    let near_end = buf.len() as u32 - 2;
    write_u32(&mut buf, 20, near_end);
    assert!(matches!(validate(&buf), Err(ValidationError::OutOfRange { .. })));

    let mut buf = unchecked(&Value::from("payload"));
    let record = read_u32(&buf, 20) as usize;
    write_u32(&mut buf, record, u32::MAX);
    assert!(matches!(validate(&buf), Err(ValidationError::OutOfRange { .. })));
}

#[test]
fn oversized_vector_lengths_are_rejected() {
    let mut buf = unchecked(&Value::Vector(vec![Value::U8(1), Value::U8(2)]));
    let record = read_u32(&buf, 20) as usize;
    write_u32(&mut buf, record + 4, u32::MAX);
    assert!(matches!(validate(&buf), Err(ValidationError::OutOfRange { .. })));
}

#[test]
fn tampered_hashes_are_rejected() {
    let mut buf = unchecked(&Value::Set(vec![Value::from("a"), Value::from("b")]));
    let record = read_u32(&buf, 20) as usize;
    let capacity = read_u32(&buf, record + 8) as usize;
    let slot = (0..capacity)
        .find(|s| read_u32(&buf, record + 12 + capacity * 4 + s * 8) != tag::UNUSED_SLOT)
        .expect("occupied slot");
    let hash_at = record + 12 + slot * 4;
    let stored = read_u32(&buf, hash_at);
    write_u32(&mut buf, hash_at, stored ^ 0x8000_0000);
    assert!(matches!(
        validate(&buf),
        Err(ValidationError::MalformedHashTable { .. })
    ));
}

#[test]
fn unknown_tags_and_foreign_byte_order_are_rejected() {
    let mut buf = unchecked(&Value::U8(1));
    write_u32(&mut buf, 16, 77);
    assert!(matches!(
        validate(&buf),
        Err(ValidationError::UnknownTag { tag: 77, .. })
    ));

    let mut buf = unchecked(&Value::U8(1));
    buf.swap(6, 7);
    assert_eq!(
        validate(&buf),
        Err(ValidationError::BadHeader("foreign byte order"))
    );
}

#[test]
fn unhashable_keys_are_rejected() {
    // one-element set at 32 whose element is a plain vector stored right after it
    let vector_at: u32 = 32 + 12 + 8 * 4 + 8 * 8;
    let mut rec = Vec::new();
    rec.extend_from_slice(&0u32.to_le_bytes());
    rec.extend_from_slice(&1u32.to_le_bytes());
    rec.extend_from_slice(&8u32.to_le_bytes());
    rec.extend_from_slice(&[0u8; 8 * 4]);
    for slot in 0..8 {
        let cell = if slot == 0 {
            Cell::new(tag::VECTOR_VALUE, vector_at)
        } else {
            Cell::new(tag::UNUSED_SLOT, 0)
        };
        cell.put(&mut rec);
    }
    rec.extend_from_slice(&1u32.to_le_bytes());
    rec.extend_from_slice(&0u32.to_le_bytes());
    let mut buf = vec![0u8; HEADER_LEN];
    buf.extend_from_slice(&rec);
    Header {
        version: VERSION,
        flags: 0,
        n_containers: 2,
        root: Cell::new(tag::SET, 32),
        checksum: 0,
        total_len: buf.len() as u32,
    }
    .encode(&mut buf);
    assert_eq!(
        validate(&buf),
        Err(ValidationError::UnhashableKey { offset: 32 })
    );
}

#[test]
fn nesting_limit_is_configurable() {
    let mut value = Value::U8(0);
    for _ in 0..10 {
        value = Value::Vector(vec![value]);
    }
    let buf = Writer::new().serialize(&value).unwrap();
    let err = OpenOptions::default()
        .max_depth(4)
        .open_bytes(buf.clone())
        .unwrap_err();
    assert!(matches!(
        err,
        FlatError::Validation(ValidationError::TooDeep { limit: 4, .. })
    ));
    assert!(OpenOptions::default().open_bytes(buf).is_ok());
}

#[test]
fn checksums_catch_payload_damage() {
    let mut buf = Writer::new().serialize(&sample()).unwrap();
    let mid = HEADER_LEN + (buf.len() - HEADER_LEN) / 2;
    buf[mid] ^= 0x10;
    assert!(matches!(
        Reader::from_bytes(buf.clone()),
        Err(FlatError::Validation(ValidationError::Checksum { .. }))
    ));
    // without the checksum the damage may or may not be structural
    let _ = OpenOptions::default().verify_checksum(false).open_bytes(buf);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn random_damage_never_escapes_the_buffer(
        edits in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..4)
    ) {
        let mut buf = unchecked(&sample());
        for (at, byte) in &edits {
            let i = at.index(buf.len());
            buf[i] = *byte;
        }
        if let Ok(reader) = Reader::from_bytes(buf) {
            let root = reader.root().unwrap();
            prop_assert!(read_everything(&reader, root).is_ok());
        }
    }
}
