//! # Fixed-Record Round-Trip Tests
//!
//! Sequential monotone inserts followed by point lookups, on in-memory
//! storage. Covers the page-fill boundary, the first-record minimum key,
//! flush idempotence, and insert-order enforcement.

use tideline::{Engine, EngineError};

const DATA_SIZE: usize = 12;

fn payload(i: u64) -> [u8; DATA_SIZE] {
    let mut data = [0u8; DATA_SIZE];
    data[..4].copy_from_slice(&((i % 100) as u32).to_le_bytes());
    data
}

fn sequential_engine() -> Engine {
    Engine::builder()
        .key_size(4)
        .data_size(DATA_SIZE)
        .page_size(512)
        .data_pages(1024)
        .erase_size_in_pages(8)
        .open()
        .unwrap()
}

#[test]
fn thousand_sequential_inserts_all_readable() {
    let mut engine = sequential_engine();
    for i in 0..1000u64 {
        engine.put(i, &payload(i)).unwrap();
    }
    engine.flush().unwrap();

    // 512-byte pages, 6-byte header, 16-byte records: 31 records per page.
    let records_per_page = engine.config().max_records_per_page() as u64;
    assert_eq!(records_per_page, 31);
    assert_eq!(engine.next_page_id() as u64, 1000_u64.div_ceil(records_per_page));

    let mut out = [0u8; DATA_SIZE];
    for i in 0..1000u64 {
        engine.get(i, &mut out).unwrap_or_else(|e| panic!("get({i}): {e}"));
        assert_eq!(out, payload(i), "key {i}");
    }
}

#[test]
fn missing_keys_report_not_found() {
    let mut engine = sequential_engine();
    let mut out = [0u8; DATA_SIZE];

    // Nothing written at all.
    let err = engine.get(7, &mut out).unwrap_err();
    assert!(EngineError::is(&err, &EngineError::KeyNotFound));

    // Keys are all even; odd keys fall between records.
    for i in 0..500u64 {
        engine.put(i * 2, &payload(i)).unwrap();
    }
    engine.flush().unwrap();
    let err = engine.get(501, &mut out).unwrap_err();
    assert!(EngineError::is(&err, &EngineError::KeyNotFound));
    let err = engine.get(5000, &mut out).unwrap_err();
    assert!(EngineError::is(&err, &EngineError::KeyNotFound));
}

#[test]
fn page_min_and_max_keys_are_found() {
    let mut engine = sequential_engine();
    let records_per_page = engine.config().max_records_per_page() as u64;
    for i in 0..records_per_page * 3 {
        engine.put(i * 10, &payload(i)).unwrap();
    }
    engine.flush().unwrap();

    let mut out = [0u8; DATA_SIZE];
    for page in 0..3 {
        let first = page * records_per_page;
        let last = (page + 1) * records_per_page - 1;
        engine.get(first * 10, &mut out).unwrap();
        assert_eq!(out, payload(first));
        engine.get(last * 10, &mut out).unwrap();
        assert_eq!(out, payload(last));
    }
}

#[test]
fn exactly_one_full_page_round_trips() {
    let mut engine = sequential_engine();
    let records_per_page = engine.config().max_records_per_page() as u64;
    for i in 0..records_per_page {
        engine.put(i, &payload(i)).unwrap();
    }
    engine.flush().unwrap();
    assert_eq!(engine.next_page_id(), 1);

    let mut out = [0u8; DATA_SIZE];
    engine.get(0, &mut out).unwrap();
    engine.get(records_per_page - 1, &mut out).unwrap();
    assert_eq!(out, payload(records_per_page - 1));
}

#[test]
fn second_flush_without_inserts_is_a_no_op() {
    let mut engine = sequential_engine();
    for i in 0..100u64 {
        engine.put(i, &payload(i)).unwrap();
    }
    engine.flush().unwrap();
    let pages_after_first = engine.next_page_id();
    let writes_after_first = engine.stats().writes;

    engine.flush().unwrap();
    assert_eq!(engine.next_page_id(), pages_after_first);
    assert_eq!(engine.stats().writes, writes_after_first);
}

#[test]
fn flush_closes_the_partial_page() {
    let mut engine = sequential_engine();
    engine.put(1, &payload(1)).unwrap();
    engine.flush().unwrap();
    engine.put(2, &payload(2)).unwrap();
    engine.flush().unwrap();
    assert_eq!(engine.next_page_id(), 2);

    let mut out = [0u8; DATA_SIZE];
    engine.get(1, &mut out).unwrap();
    assert_eq!(out, payload(1));
    engine.get(2, &mut out).unwrap();
    assert_eq!(out, payload(2));
}

#[test]
fn descending_insert_is_rejected() {
    let mut engine = sequential_engine();
    engine.put(100, &payload(0)).unwrap();
    let err = engine.put(50, &payload(1)).unwrap_err();
    assert!(EngineError::is(
        &err,
        &EngineError::OrderViolation { key: 50, max: 100 }
    ));

    // Equal keys are non-decreasing and stay accepted.
    engine.put(100, &payload(2)).unwrap();
}

#[test]
fn wrong_payload_width_is_rejected() {
    let mut engine = sequential_engine();
    assert!(engine.put(1, &[0u8; DATA_SIZE - 1]).is_err());
    assert!(engine.put(1, &[0u8; DATA_SIZE + 1]).is_err());
}

#[test]
fn radix_accelerated_lookups_agree_with_plain_spline() {
    let mut engine = Engine::builder()
        .key_size(4)
        .data_size(4)
        .page_size(128)
        .data_pages(64)
        .erase_size_in_pages(8)
        .radix_bits(12)
        .open()
        .unwrap();
    // Keys spread across many radix prefixes.
    for i in 0..500u64 {
        engine.put(i << 16, &(i as u32).to_le_bytes()).unwrap();
    }
    engine.flush().unwrap();

    let mut out = [0u8; 4];
    for i in 0..500u64 {
        engine
            .get(i << 16, &mut out)
            .unwrap_or_else(|e| panic!("get({i}): {e}"));
        assert_eq!(out, (i as u32).to_le_bytes());
    }
    assert!(engine.get(1 << 15, &mut out).is_err());
}

#[test]
fn eight_byte_keys_round_trip() {
    let mut engine = Engine::builder()
        .key_size(8)
        .data_size(4)
        .page_size(256)
        .data_pages(64)
        .erase_size_in_pages(8)
        .open()
        .unwrap();
    let base = u64::MAX - 100_000;
    for i in 0..1000u64 {
        engine.put(base + i * 7, &(i as u32).to_le_bytes()).unwrap();
    }
    engine.flush().unwrap();

    let mut out = [0u8; 4];
    for i in 0..1000u64 {
        engine.get(base + i * 7, &mut out).unwrap();
        assert_eq!(out, (i as u32).to_le_bytes());
    }
    assert!(engine.get(base + 3, &mut out).is_err());
}

#[test]
fn key_wider_than_configured_width_is_rejected() {
    let mut engine = sequential_engine();
    // 4-byte keys top out at u32::MAX.
    assert!(engine.put(u64::from(u32::MAX) + 1, &payload(0)).is_err());
    engine.put(u64::from(u32::MAX), &payload(0)).unwrap();
}
