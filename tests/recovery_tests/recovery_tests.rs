//! Tests for recovery on open
//!
//! These tests verify:
//! - Reopening reproduces index, block table and write buffer
//! - Under-full tail blocks are restored into the write buffer
//! - Truncated and damaged files are rejected as corruption
//! - Bad headers are rejected as format errors
//! - Redundant tombstones replay as no-ops

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zkv::compression::{NoneCompressor, NONE_ID, ZSTD_ID};
use zkv::format::{encode_block, encode_record, write_header, Action, HEADER_SIZE};
use zkv::{Config, Engine, RecoveryReport, ZkvError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.zkv");
    (temp_dir, path)
}

fn config(block_data_size: u64, compressor: i8) -> Config {
    Config::builder()
        .block_data_size(block_data_size)
        .compressor(compressor)
        .sync_on_flush(false)
        .build()
}

/// Raw key of exactly 10 bytes
fn raw_key(i: u32) -> Vec<u8> {
    format!("key-{:06}", i).into_bytes()
}

/// Raw value of exactly 21 bytes; with a 10-byte key the record is 48 bytes
fn raw_value(i: u32) -> Vec<u8> {
    format!("value-{:015}", i).into_bytes()
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

fn truncate(path: &Path, len: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

/// Build a file by hand from uncompressed block payloads
fn write_raw_file(path: &Path, block_data_size: u64, payloads: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    write_header(&mut file, block_data_size, NONE_ID).unwrap();
    for payload in payloads {
        let block = encode_block(&NoneCompressor, payload).unwrap();
        file.write_all(&block).unwrap();
    }
    file.sync_all().unwrap();
}

fn add(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_record(&mut buf, Action::Add, key, Some(value)).unwrap();
    buf
}

fn del(key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_record(&mut buf, Action::Delete, key, None).unwrap();
    buf
}

// =============================================================================
// Round-Trip and Idempotence Tests
// =============================================================================

#[test]
fn test_values_survive_reopen() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(1024, ZSTD_ID)).unwrap();
    for i in 0..300u32 {
        engine.set(&i, &format!("v{}", i)).unwrap();
    }
    engine.set(&10u32, "overwritten").unwrap();
    engine.delete(&20u32).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(1024, ZSTD_ID)).unwrap();

    assert_eq!(engine.count(), 299);
    assert_eq!(engine.get::<_, String>(&10u32).unwrap(), "overwritten");
    assert!(engine.get::<_, String>(&20u32).unwrap_err().is_not_found());
    assert_eq!(engine.get::<_, String>(&299u32).unwrap(), "v299");
}

#[test]
fn test_recovery_is_idempotent() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(500, NONE_ID)).unwrap();
    for i in 0..37u32 {
        engine.set_raw(&raw_key(i), &raw_value(i)).unwrap();
    }
    engine.delete_raw(&raw_key(3)).unwrap();

    let count = engine.count();
    let blocks = engine.block_count();
    let pending = engine.pending_bytes();
    assert!(!pending.is_empty());
    engine.close().unwrap();

    for _ in 0..3 {
        let engine = Engine::open(&path, config(500, NONE_ID)).unwrap();
        assert_eq!(engine.count(), count);
        assert_eq!(engine.block_count(), blocks);
        assert_eq!(engine.pending_bytes(), pending);
        engine.close().unwrap();
    }
}

#[test]
fn test_reopen_after_restored_tail_keeps_stale_copy_as_block() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(1), &raw_value(1)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(2), &raw_value(2)).unwrap();
    let count = engine.count();
    let pending = engine.pending_bytes();
    assert_eq!(engine.block_count(), 0);
    engine.close().unwrap();

    // The superseded tail copy stays on disk as a full-fledged block
    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    assert_eq!(engine.count(), count);
    assert_eq!(engine.block_count(), 1);
    assert_eq!(engine.pending_bytes(), pending);
    let mut visited = 0;
    engine
        .iterate_raw(|_, _| {
            visited += 1;
            true
        })
        .unwrap();
    assert_eq!(visited, 2);
    engine.close().unwrap();

    // Without new writes the layout is stable from here on
    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    assert_eq!(engine.count(), count);
    assert_eq!(engine.block_count(), 1);
    assert_eq!(engine.pending_bytes(), pending);
}

#[test]
fn test_close_without_writes_does_not_grow_file() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set("a", "b").unwrap();
    engine.close().unwrap();
    let size = file_len(&path);

    for _ in 0..3 {
        let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
        assert!(engine.recovery_report().tail_restored);
        drop(engine);
        assert_eq!(file_len(&path), size);
    }
}

#[test]
fn test_empty_storage_reopens() {
    let (_temp, path) = setup_temp_path();

    Engine::open(&path, Config::default()).unwrap().close().unwrap();
    assert_eq!(file_len(&path), HEADER_SIZE);

    let engine = Engine::open(&path, Config::default()).unwrap();

    assert!(engine.is_empty());
    assert_eq!(engine.block_count(), 0);
    assert_eq!(engine.current_block(), 0);
    assert_eq!(engine.buffer_len(), 0);
    assert_eq!(engine.recovery_report(), &RecoveryReport::default());
}

#[test]
fn test_drop_flushes_pending_records() {
    let (_temp, path) = setup_temp_path();

    {
        let engine = Engine::open(&path, config(4096, ZSTD_ID)).unwrap();
        engine.set("dropped", &7i32).unwrap();
    }

    let engine = Engine::open(&path, config(4096, ZSTD_ID)).unwrap();
    assert_eq!(engine.get::<_, i32>("dropped").unwrap(), 7);
}

// =============================================================================
// Tail Block Tests
// =============================================================================

#[test]
fn test_underfull_tail_is_restored_into_buffer() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(1), &raw_value(1)).unwrap();
    engine.set_raw(&raw_key(2), &raw_value(2)).unwrap();
    engine.set_raw(&raw_key(3), &raw_value(3)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    let report = engine.recovery_report().clone();

    assert_eq!(report.blocks_replayed, 2);
    assert!(report.tail_restored);
    assert_eq!(engine.block_count(), 1);
    assert_eq!(engine.current_block(), 1);
    assert_eq!(engine.buffer_len(), 48);
    assert_eq!(engine.pending_bytes(), add(&raw_key(3), &raw_value(3)));
    assert_eq!(engine.get_raw(&raw_key(3)).unwrap(), raw_value(3));
}

#[test]
fn test_full_tail_is_not_restored() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(1), &raw_value(1)).unwrap();
    engine.set_raw(&raw_key(2), &raw_value(2)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();

    assert!(!engine.recovery_report().tail_restored);
    assert_eq!(engine.block_count(), 1);
    assert_eq!(engine.current_block(), 1);
    assert_eq!(engine.buffer_len(), 0);
}

#[test]
fn test_writes_after_restored_tail_survive_reopen() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(1), &raw_value(1)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(2), &raw_value(2)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    let report = engine.recovery_report();

    // Restored tail was appended again as a superset of itself
    assert_eq!(report.blocks_replayed, 2);
    assert_eq!(report.records_replayed, 3);
    assert!(report.tail_restored);
    assert_eq!(engine.count(), 2);
    assert_eq!(engine.buffer_len(), 96);
    assert_eq!(engine.get_raw(&raw_key(1)).unwrap(), raw_value(1));
    assert_eq!(engine.get_raw(&raw_key(2)).unwrap(), raw_value(2));
}

// =============================================================================
// Redundant Delete Tests
// =============================================================================

#[test]
fn test_replayed_delete_of_unindexed_key_is_noop() {
    let (_temp, path) = setup_temp_path();
    let mut payload = add(b"kept", b"value");
    payload.extend(del(b"never-added"));
    write_raw_file(&path, 1024, &[payload]);

    let engine = Engine::open(&path, Config::default()).unwrap();
    let report = engine.recovery_report();

    assert_eq!(report.records_replayed, 2);
    assert_eq!(report.tombstones_replayed, 1);
    assert_eq!(report.redundant_deletes, 1);
    assert_eq!(engine.count(), 1);
    assert_eq!(engine.get_raw(b"kept").unwrap(), b"value".to_vec());
}

#[test]
fn test_restored_tombstone_replays_twice() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(1), &raw_value(1)).unwrap();
    engine.set_raw(&raw_key(2), &raw_value(2)).unwrap();
    engine.delete_raw(&raw_key(1)).unwrap();
    engine.close().unwrap();

    // Tail block holding only the tombstone is restored, then re-appended
    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    engine.set_raw(&raw_key(3), &raw_value(3)).unwrap();
    engine.close().unwrap();

    let engine = Engine::open(&path, config(96, NONE_ID)).unwrap();
    let report = engine.recovery_report();

    assert_eq!(report.tombstones_replayed, 2);
    assert_eq!(report.redundant_deletes, 1);
    assert_eq!(engine.count(), 2);
    assert!(engine.get_raw(&raw_key(1)).unwrap_err().is_not_found());
    assert_eq!(engine.get_raw(&raw_key(3)).unwrap(), raw_value(3));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_block_body_is_corruption() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(256, ZSTD_ID)).unwrap();
    for i in 0..100u32 {
        engine.set(&i, &i).unwrap();
    }
    engine.close().unwrap();

    truncate(&path, file_len(&path) - 5);

    match Engine::open(&path, config(256, ZSTD_ID)) {
        Err(e) => assert!(e.is_corruption(), "unexpected error: {}", e),
        Ok(_) => panic!("truncated file opened"),
    }
}

#[test]
fn test_truncated_block_header_is_corruption() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(1024, NONE_ID)).unwrap();
    engine.set("key", "value").unwrap();
    engine.close().unwrap();

    truncate(&path, HEADER_SIZE + 10);

    let result = Engine::open(&path, config(1024, NONE_ID));
    assert!(matches!(result, Err(ZkvError::CorruptBlock(_))));
}

#[test]
fn test_damaged_record_is_corruption() {
    let (_temp, path) = setup_temp_path();
    let mut payload = add(b"key", b"value");
    // Negative value length
    let len_at = 1 + 8 + 3;
    payload[len_at..len_at + 8].copy_from_slice(&(-1i64).to_le_bytes());
    write_raw_file(&path, 1024, &[payload]);

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::CorruptRecord(_))));
}

#[test]
fn test_unknown_action_is_corruption() {
    let (_temp, path) = setup_temp_path();
    let mut payload = add(b"key", b"value");
    payload[0] = 9;
    write_raw_file(&path, 1024, &[payload]);

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::UnknownAction(9))));
}

#[test]
fn test_get_of_rewritten_key_is_index_corruption() {
    let (_temp, path) = setup_temp_path();
    let engine = Engine::open(&path, config(10, NONE_ID)).unwrap();
    engine.set_raw(b"keyA", b"value").unwrap();
    assert_eq!(engine.block_count(), 1);

    // Key bytes of the first record: header, block frame, action, key length
    let mut bytes = fs::read(&path).unwrap();
    let at = HEADER_SIZE as usize + 16 + 1 + 8;
    assert_eq!(&bytes[at..at + 4], b"keyA");
    bytes[at..at + 4].copy_from_slice(b"keyB");
    fs::write(&path, bytes).unwrap();

    let result = engine.get_raw(b"keyA");

    match result {
        Err(e @ ZkvError::IndexCorruption(_)) => assert!(e.is_corruption()),
        other => panic!("expected index corruption, got {:?}", other),
    }
}

#[test]
fn test_block_length_mismatch_is_corruption() {
    let (_temp, path) = setup_temp_path();
    write_raw_file(&path, 1024, &[add(b"key", b"value")]);

    // Overwrite the uncompressed length of the first block
    let mut bytes = fs::read(&path).unwrap();
    let at = HEADER_SIZE as usize + 8;
    bytes[at..at + 8].copy_from_slice(&1000i64.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::CorruptBlock(_))));
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_bad_magic_is_format_error() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"NOTZKV\x01\x03\x00\x04\x00\x00\x00\x00").unwrap();

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::BadFormat(_))));
}

#[test]
fn test_short_file_is_format_error() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"ZKV").unwrap();

    let result = Engine::open(&path, Config::default());

    match result {
        Err(e) => assert!(e.is_format_error()),
        Ok(_) => panic!("short file opened"),
    }
}

#[test]
fn test_empty_file_is_format_error() {
    let (_temp, path) = setup_temp_path();
    File::create(&path).unwrap();

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::BadFormat(_))));
}

#[test]
fn test_unknown_compressor_in_header() {
    let (_temp, path) = setup_temp_path();
    let mut file = File::create(&path).unwrap();
    write_header(&mut file, 1024, 99).unwrap();
    drop(file);

    let result = Engine::open(&path, Config::default());

    assert!(matches!(result, Err(ZkvError::UnknownCompressor(99))));
}

// =============================================================================
// Read-Only Reopen Tests
// =============================================================================

#[test]
fn test_read_only_reopen_sees_data_and_leaves_file_untouched() {
    let (_temp, path) = setup_temp_path();

    let engine = Engine::open(&path, config(128, ZSTD_ID)).unwrap();
    for i in 0..20u8 {
        engine.set(&i, &(i as u64 * 10)).unwrap();
    }
    engine.close().unwrap();
    let size = file_len(&path);

    let engine = Engine::open(&path, Config::builder().read_only(true).build()).unwrap();
    assert_eq!(engine.count(), 20);
    for i in 0..20u8 {
        assert_eq!(engine.get::<_, u64>(&i).unwrap(), i as u64 * 10);
    }
    engine.close().unwrap();

    assert_eq!(file_len(&path), size);
}
