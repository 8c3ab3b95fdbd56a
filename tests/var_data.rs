//! # Variable-Data Tests
//!
//! Blob round-trips through the variable-data log, page-boundary edge
//! cases (a blob exactly filling a page, a length prefix that would
//! straddle one), chunked stream reads, wrap eviction, and the iterator's
//! blob-resolving variant.

use tideline::{Engine, EngineBuilder, IterQuery, VarData};

const DATA_SIZE: usize = 4;
const PAGE_SIZE: usize = 128;

fn payload(i: u64) -> [u8; DATA_SIZE] {
    ((i % 100) as u32).to_le_bytes()
}

fn blob(i: u64) -> Vec<u8> {
    format!("Testing {i:07}").into_bytes()
}

fn var_builder() -> EngineBuilder {
    Engine::builder()
        .key_size(4)
        .data_size(DATA_SIZE)
        .page_size(PAGE_SIZE)
        .buffer_blocks(4)
        .use_var_data(true)
        .erase_size_in_pages(8)
}

fn read_blob(engine: &mut Engine, key: u64) -> Option<Vec<u8>> {
    let mut data = [0u8; DATA_SIZE];
    match engine.get_var(key, &mut data).unwrap() {
        VarData::Stream(mut stream) => {
            let mut out = vec![0u8; stream.len() as usize];
            let n = engine.read_var_stream(&mut stream, &mut out).unwrap();
            assert_eq!(n, out.len());
            assert_eq!(stream.bytes_remaining(), 0);
            Some(out)
        }
        VarData::None => None,
        VarData::Evicted => panic!("unexpected eviction for key {key}"),
    }
}

#[test]
fn six_hundred_blobs_round_trip() {
    let mut engine = var_builder()
        .data_pages(64)
        .var_pages(128)
        .open()
        .unwrap();
    for i in 0..600u64 {
        engine.put_var(i, &payload(i), Some(&blob(i))).unwrap();
    }
    engine.flush().unwrap();

    let mut data = [0u8; DATA_SIZE];
    for i in 0..600u64 {
        let got = read_blob(&mut engine, i).unwrap_or_else(|| panic!("key {i} lost its blob"));
        assert_eq!(got, blob(i), "key {i}");
        assert_eq!(got.len(), 15);
        engine.get(i, &mut data).unwrap();
        assert_eq!(data, payload(i));
    }
}

#[test]
fn record_without_blob_reports_none() {
    let mut engine = var_builder()
        .data_pages(16)
        .var_pages(16)
        .open()
        .unwrap();
    engine.put_var(1, &payload(1), Some(b"hello")).unwrap();
    engine.put_var(2, &payload(2), None).unwrap();
    engine.flush().unwrap();

    assert_eq!(read_blob(&mut engine, 1).as_deref(), Some(&b"hello"[..]));
    assert!(read_blob(&mut engine, 2).is_none());
}

#[test]
fn wrapped_var_region_reports_eviction() {
    let mut engine = var_builder()
        .data_pages(32)
        .var_pages(16)
        .erase_size_in_pages(2)
        .open()
        .unwrap();
    // 16 var pages hold roughly a hundred 15-byte blobs; 200 forces wrap.
    for i in 0..200u64 {
        engine.put_var(i, &payload(i), Some(&blob(i))).unwrap();
    }
    engine.flush().unwrap();

    let min_live = engine.min_var_key();
    assert!(min_live > 0, "var region never wrapped");

    let mut data = [0u8; DATA_SIZE];
    let early = engine.get_var(0, &mut data).unwrap();
    assert!(early.is_evicted());
    // The fixed record is still intact alongside the eviction report.
    assert_eq!(data, payload(0));

    let got = read_blob(&mut engine, 199).unwrap();
    assert_eq!(got, blob(199));
    if min_live < 199 {
        let got = read_blob(&mut engine, min_live).unwrap();
        assert_eq!(got, blob(min_live));
    }
}

#[test]
fn blob_exactly_filling_one_page_round_trips() {
    let mut engine = var_builder()
        .data_pages(16)
        .var_pages(16)
        .open()
        .unwrap();
    // First var page: 4-byte key header + 4-byte length leaves 120 bytes.
    let exact: Vec<u8> = (0..120u32).map(|b| b as u8).collect();
    engine.put_var(1, &payload(1), Some(&exact)).unwrap();
    engine.put_var(2, &payload(2), Some(b"after")).unwrap();
    engine.flush().unwrap();

    assert_eq!(read_blob(&mut engine, 1).unwrap(), exact);
    assert_eq!(read_blob(&mut engine, 2).as_deref(), Some(&b"after"[..]));
}

#[test]
fn length_prefix_moves_to_the_next_page_when_short() {
    let mut engine = var_builder()
        .data_pages(16)
        .var_pages(16)
        .open()
        .unwrap();
    // 117 payload bytes leave 3 bytes on the page, too few for the next
    // blob's length prefix; the writer must close the page first.
    let filler: Vec<u8> = vec![0xAB; 117];
    engine.put_var(1, &payload(1), Some(&filler)).unwrap();
    engine.put_var(2, &payload(2), Some(b"boundary")).unwrap();
    engine.flush().unwrap();

    assert_eq!(read_blob(&mut engine, 1).unwrap(), filler);
    assert_eq!(read_blob(&mut engine, 2).as_deref(), Some(&b"boundary"[..]));
}

#[test]
fn multi_page_blob_streams_in_chunks() {
    let mut engine = var_builder()
        .data_pages(16)
        .var_pages(16)
        .open()
        .unwrap();
    let big: Vec<u8> = (0..300u32).map(|b| (b % 251) as u8).collect();
    engine.put_var(1, &payload(1), Some(&big)).unwrap();
    engine.flush().unwrap();

    let mut data = [0u8; DATA_SIZE];
    let VarData::Stream(mut stream) = engine.get_var(1, &mut data).unwrap() else {
        panic!("expected a stream");
    };
    assert_eq!(stream.len(), 300);

    let mut collected = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = engine.read_var_stream(&mut stream, &mut chunk).unwrap();
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(collected, big);
}

#[test]
fn iterator_resolves_blobs_alongside_records() {
    let mut engine = var_builder()
        .data_pages(16)
        .var_pages(32)
        .open()
        .unwrap();
    for i in 0..30u64 {
        let var = (i % 3 != 0).then(|| blob(i));
        engine.put_var(i, &payload(i), var.as_deref()).unwrap();
    }
    engine.flush().unwrap();

    let mut it = engine.iter(IterQuery::default());
    let mut data = [0u8; DATA_SIZE];
    let mut seen = 0u64;
    while let Some((key, var)) = it.next_var(&mut engine, &mut data).unwrap() {
        assert_eq!(key, seen);
        assert_eq!(data, payload(key));
        match var {
            VarData::Stream(mut stream) => {
                assert!(key % 3 != 0);
                let mut out = vec![0u8; stream.len() as usize];
                engine.read_var_stream(&mut stream, &mut out).unwrap();
                assert_eq!(out, blob(key));
            }
            VarData::None => assert_eq!(key % 3, 0),
            VarData::Evicted => panic!("nothing should be evicted"),
        }
        seen += 1;
    }
    assert_eq!(seen, 30);
}
