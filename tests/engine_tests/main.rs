//! Tests for Engine
//!
//! These tests verify:
//! - Multi-bucket transactions commit atomically
//! - Dropped transactions leave no trace
//! - Flush to SSTable and compaction keep data readable
//! - Crash recovery from WAL
//! - Snapshot isolation and single-writer behaviour under concurrency

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use pagekv::config::{Config, WalSyncStrategy};
use pagekv::{Bucket, Engine, StoreError};
use tempfile::TempDir;

const LEFT: Bucket = Bucket::new("left");
const RIGHT: Bucket = Bucket::new("right");

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(dir: &TempDir, memtable_size_limit: usize) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(memtable_size_limit)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
    (temp_dir, engine)
}

fn setup_temp_engine_with_small_memtable() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 100)).unwrap();
    (temp_dir, engine)
}

fn put_pair(engine: &Engine, key: &str, value: &str) {
    let mut txn = engine.begin_write();
    txn.put(LEFT, key.as_bytes(), value.as_bytes());
    txn.put(RIGHT, key.as_bytes(), value.as_bytes());
    txn.commit().unwrap();
}

fn collect(engine: &Engine, bucket: Bucket) -> Vec<(String, String)> {
    let mut out = Vec::new();
    engine
        .snapshot()
        .for_each(bucket, |key, value| {
            out.push((
                String::from_utf8(key.to_vec()).unwrap(),
                String::from_utf8(value.to_vec()).unwrap(),
            ));
            Ok::<(), StoreError>(())
        })
        .unwrap();
    out
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();

    let zero_memtable = config_for(&temp_dir, 0);
    assert!(matches!(Engine::open(zero_memtable), Err(StoreError::Config(_))));

    let zero_sync = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 0 })
        .build();
    assert!(matches!(Engine::open(zero_sync), Err(StoreError::Config(_))));
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_commit_writes_both_buckets() {
    let (_temp, engine) = setup_temp_engine();

    put_pair(&engine, "k", "v");

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.get(LEFT, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(snapshot.get(RIGHT, b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_buckets_are_separate_namespaces() {
    let (_temp, engine) = setup_temp_engine();

    let mut txn = engine.begin_write();
    txn.put(LEFT, b"k", b"left value");
    txn.commit().unwrap();

    assert_eq!(engine.snapshot().get(RIGHT, b"k").unwrap(), None);
}

#[test]
fn test_dropped_txn_discards_writes() {
    let (_temp, engine) = setup_temp_engine();

    {
        let mut txn = engine.begin_write();
        txn.put(LEFT, b"k", b"v");
        assert_eq!(txn.len(), 1);
    }

    assert_eq!(engine.snapshot().get(LEFT, b"k").unwrap(), None);
    assert_eq!(engine.memtable_entry_count(), 0);
}

#[test]
fn test_txn_reads_its_own_writes() {
    let (_temp, engine) = setup_temp_engine();
    put_pair(&engine, "k", "committed");

    let mut txn = engine.begin_write();
    assert_eq!(txn.get(LEFT, b"k").unwrap(), Some(b"committed".to_vec()));
    txn.put(LEFT, b"k", b"staged");
    assert_eq!(txn.get(LEFT, b"k").unwrap(), Some(b"staged".to_vec()));

    // Not visible outside until commit
    assert_eq!(
        engine.snapshot().get(LEFT, b"k").unwrap(),
        Some(b"committed".to_vec())
    );
    txn.commit().unwrap();
    assert_eq!(engine.snapshot().get(LEFT, b"k").unwrap(), Some(b"staged".to_vec()));
}

#[test]
fn test_empty_commit_is_a_no_op() {
    let (_temp, engine) = setup_temp_engine();

    let txn = engine.begin_write();
    assert!(txn.is_empty());
    assert_eq!(txn.commit().unwrap(), None);
}

#[test]
fn test_commit_returns_increasing_lsns() {
    let (_temp, engine) = setup_temp_engine();

    let mut first = engine.begin_write();
    first.put(LEFT, b"a", b"1");
    let lsn1 = first.commit().unwrap().unwrap();

    let mut second = engine.begin_write();
    second.put(LEFT, b"b", b"2");
    let lsn2 = second.commit().unwrap().unwrap();

    assert!(lsn2 > lsn1);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_for_each_is_ordered_and_bucket_scoped() {
    let (_temp, engine) = setup_temp_engine();
    for key in ["delta", "alpha", "charlie", "bravo"] {
        put_pair(&engine, key, key);
    }
    let mut txn = engine.begin_write();
    txn.put(RIGHT, b"only-right", b"x");
    txn.commit().unwrap();

    let keys: Vec<_> = collect(&engine, LEFT).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta"]);
    assert_eq!(collect(&engine, RIGHT).len(), 5);
}

#[test]
fn test_for_each_merges_memtable_and_tables() {
    let (_temp, engine) = setup_temp_engine();
    put_pair(&engine, "a", "old");
    put_pair(&engine, "b", "flushed");
    engine.flush().unwrap();
    put_pair(&engine, "a", "new");
    put_pair(&engine, "c", "fresh");

    assert_eq!(
        collect(&engine, LEFT),
        vec![
            ("a".to_string(), "new".to_string()),
            ("b".to_string(), "flushed".to_string()),
            ("c".to_string(), "fresh".to_string()),
        ]
    );
}

#[test]
fn test_for_each_stops_at_visitor_error() {
    let (_temp, engine) = setup_temp_engine();
    for key in ["a", "b", "c"] {
        put_pair(&engine, key, key);
    }

    let mut visited = Vec::new();
    let result = engine.snapshot().for_each(LEFT, |key, _| {
        visited.push(key.to_vec());
        if key == b"b" {
            return Err(StoreError::Storage("stop".into()));
        }
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(visited, vec![b"a".to_vec(), b"b".to_vec()]);
}

// =============================================================================
// Flush & Compaction Tests
// =============================================================================

#[test]
fn test_flush_moves_memtable_to_sstable() {
    let (_temp, engine) = setup_temp_engine();
    put_pair(&engine, "k", "v");

    engine.flush().unwrap();

    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.snapshot().get(LEFT, b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_auto_flush_and_compaction() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .memtable_size_limit(100)
        .max_sstables(2)
        .build();
    let engine = Engine::open(config).unwrap();

    for i in 0..50 {
        put_pair(&engine, &format!("key{:03}", i), &format!("value{:03}", i));
    }

    assert!(engine.sstable_count() <= 2);
    for i in 0..50 {
        assert_eq!(
            engine.snapshot().get(RIGHT, format!("key{:03}", i).as_bytes()).unwrap(),
            Some(format!("value{:03}", i).into_bytes())
        );
    }
}

#[test]
fn test_auto_flush_triggers_at_exact_limit() {
    // "left\0k" + "v" and "right\0k" + "v": 7 + 8 bytes
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 15)).unwrap();

    put_pair(&engine, "k", "v");

    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);

    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir, 16)).unwrap();

    put_pair(&engine, "k", "v");

    assert_eq!(engine.memtable_entry_count(), 2);
    assert_eq!(engine.sstable_count(), 0);
}

#[test]
fn test_compact_keeps_newest_values() {
    let (_temp, engine) = setup_temp_engine();
    for round in 0..3 {
        put_pair(&engine, "shared", &format!("round{}", round));
        put_pair(&engine, &format!("only{}", round), "x");
        engine.flush().unwrap();
    }
    assert_eq!(engine.sstable_count(), 3);

    engine.compact().unwrap();

    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(
        engine.snapshot().get(LEFT, b"shared").unwrap(),
        Some(b"round2".to_vec())
    );
    assert_eq!(collect(&engine, LEFT).len(), 4);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_after_close() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        put_pair(&engine, "k", "v");
        engine.close().unwrap();
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
    assert_eq!(engine.snapshot().get(RIGHT, b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_recovery_from_wal_without_close() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        for i in 0..10 {
            put_pair(&engine, &format!("k{}", i), &format!("v{}", i));
        }
        // Simulate a crash: no flush, no close
        std::mem::forget(engine);
    }

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(collect(&engine, LEFT).len(), 10);
    assert_eq!(collect(&engine, RIGHT).len(), 10);
    // Recovered batches are made durable in an SSTable at open
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.memtable_entry_count(), 0);
}

#[test]
fn test_recovery_drops_torn_batch_whole() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();
        put_pair(&engine, "good", "1");
        std::mem::forget(engine);
    }

    // Garbage where a second batch would have started
    let mut wal = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join("wal.log"))
        .unwrap();
    wal.write_all(&[9u8; 24]).unwrap();
    drop(wal);

    let engine = Engine::open(config_for(&temp_dir, 1024 * 1024)).unwrap();

    assert_eq!(engine.snapshot().get(LEFT, b"good").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.snapshot().get(RIGHT, b"good").unwrap(), Some(b"1".to_vec()));
    assert_eq!(collect(&engine, LEFT).len(), 1);
}

#[test]
fn test_small_memtable_survives_reopen() {
    let (temp_dir, engine) = setup_temp_engine_with_small_memtable();
    for i in 0..20 {
        put_pair(&engine, &format!("k{:02}", i), "value");
    }
    assert!(engine.sstable_count() > 0);
    engine.close().unwrap();

    let engine = Engine::open(config_for(&temp_dir, 100)).unwrap();
    assert_eq!(collect(&engine, LEFT).len(), 20);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_snapshot_is_isolated_from_later_commits_and_flushes() {
    let (_temp, engine) = setup_temp_engine();
    put_pair(&engine, "a", "1");

    let snapshot = engine.snapshot();
    put_pair(&engine, "a", "2");
    put_pair(&engine, "b", "2");
    engine.flush().unwrap();
    put_pair(&engine, "c", "3");
    engine.compact().unwrap();

    assert_eq!(snapshot.get(LEFT, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(snapshot.get(LEFT, b"b").unwrap(), None);
}

#[test]
fn test_readers_see_both_buckets_or_neither() {
    let (_temp, engine) = setup_temp_engine_with_small_memtable();
    let engine = Arc::new(engine);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                put_pair(&engine, &format!("k{:03}", i), "v");
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..3 {
            s.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let snapshot = engine.snapshot();
                    let left = count(&snapshot, LEFT);
                    let right = count(&snapshot, RIGHT);
                    assert_eq!(left, right);
                }
            });
        }
    });

    assert_eq!(collect(&engine, LEFT).len(), 200);
}

fn count(snapshot: &pagekv::Snapshot, bucket: Bucket) -> usize {
    let mut n = 0;
    snapshot
        .for_each(bucket, |_, _| {
            n += 1;
            Ok::<(), StoreError>(())
        })
        .unwrap();
    n
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    const COUNTER: Bucket = Bucket::new("counter");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..25 {
                    let mut txn = engine.begin_write();
                    let current = txn
                        .get(COUNTER, b"n")
                        .unwrap()
                        .map(|v| u64::from_le_bytes(v.try_into().unwrap()))
                        .unwrap_or(0);
                    txn.put(COUNTER, b"n", &(current + 1).to_le_bytes());
                    txn.commit().unwrap();
                }
            });
        }
    });

    let value = engine.snapshot().get(COUNTER, b"n").unwrap().unwrap();
    assert_eq!(u64::from_le_bytes(value.try_into().unwrap()), 100);
}
