//! Loading must reject every malformed footer before touching the records

use prefixdb::{BufferMode, Database, LoadMode, PrefixDbError};
use std::fs;
use tempfile::TempDir;

// Footer field offsets, counted back from the end of the buffer
const FIELD_BITS: usize = 31 - 16;
const NODES_COUNT: usize = 31 - 17;
const VERSION: usize = 31 - 21;
const TOTAL_SIZE: usize = 31 - 23;
const MAGIC: usize = 31 - 27;

fn valid() -> Vec<u8> {
    let mut db = Database::new();
    db.insert_str("10.0.0.0/8").unwrap();
    db.insert_str("192.168.0.0/16").unwrap();
    db.to_vec().unwrap()
}

fn put_u32(data: &mut [u8], from_end: usize, value: u32) {
    let start = data.len() - from_end;
    data[start..start + 4].copy_from_slice(&value.to_be_bytes());
}

fn assert_rejected(data: &[u8]) {
    for mode in [BufferMode::Borrow, BufferMode::Copy] {
        match Database::load_bytes(data, mode) {
            Err(PrefixDbError::InvalidParameter(_)) => {}
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }
    assert!(matches!(
        Database::copy_bytes(data),
        Err(PrefixDbError::InvalidParameter(_))
    ));
}

#[test]
fn test_valid_buffer_loads() {
    let data = valid();
    assert!(Database::load_bytes(&data, BufferMode::Borrow).is_ok());
}

#[test]
fn test_short_buffers() {
    assert_rejected(&[]);
    assert_rejected(&[0u8; 30]);
    let data = valid();
    assert_rejected(&data[1..]);
    assert_rejected(&data[..data.len() - 1]);
}

#[test]
fn test_bad_magic() {
    let mut data = valid();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    assert_rejected(&data);

    let mut data = valid();
    put_u32(&mut data, MAGIC, 0x4244_4650);
    assert_rejected(&data);
}

#[test]
fn test_reserved_node_count() {
    let mut data = valid();
    put_u32(&mut data, NODES_COUNT, u32::MAX);
    assert_rejected(&data);
}

#[test]
fn test_node_count_mismatch() {
    let mut data = valid();
    let count = u32::from_be_bytes(data[data.len() - NODES_COUNT..][..4].try_into().unwrap());
    put_u32(&mut data, NODES_COUNT, count + 1);
    assert_rejected(&data);
}

#[test]
fn test_total_size_mismatch() {
    let mut data = valid();
    let len = data.len() as u32;
    put_u32(&mut data, TOTAL_SIZE, len + 1);
    assert_rejected(&data);
}

#[test]
fn test_newer_version() {
    let mut data = valid();
    let at = data.len() - VERSION;
    data[at..at + 2].copy_from_slice(&0x0102u16.to_be_bytes());
    assert_rejected(&data);

    // older versions are fine
    let mut data = valid();
    let at = data.len() - VERSION;
    data[at..at + 2].copy_from_slice(&0x0100u16.to_be_bytes());
    assert!(Database::load_bytes(&data, BufferMode::Borrow).is_ok());
}

#[test]
fn test_bad_field_width() {
    for bits in [0u8, 4, 12] {
        let mut data = valid();
        let at = data.len() - FIELD_BITS;
        data[at] = bits;
        assert_rejected(&data);
    }
}

#[test]
fn test_reserved_bytes_nonzero() {
    let mut data = valid();
    let at = data.len() - 31;
    data[at] = 1;
    assert_rejected(&data);
}

#[test]
fn test_corrupt_files() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.pfdb");

    let mut data = valid();
    put_u32(&mut data, MAGIC, 0);
    fs::write(&path, &data).unwrap();
    for mode in [LoadMode::Copy, LoadMode::Mmap] {
        assert!(matches!(
            Database::load_file(&path, mode),
            Err(PrefixDbError::InvalidParameter(_))
        ));
    }

    fs::write(&path, b"short").unwrap();
    assert!(Database::load_file(&path, LoadMode::Mmap).is_err());

    assert!(matches!(
        Database::load_file(temp_dir.path().join("missing.pfdb"), LoadMode::Copy),
        Err(PrefixDbError::Access(_))
    ));
}
