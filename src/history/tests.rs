use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use crate::core::metrics::{now_millis, Reading, Sample};
use crate::core::types::ResolvedValue;
use crate::history::cleanup::{apply, CleanupPolicy};
use crate::history::{HistoryOptions, HistoryStore, RingBuffer, SqliteStore};
use crate::test_utils::{numeric_sample, FlakyStore};
use crate::traits::SampleStore;

fn mixed_sample(timestamp: i64) -> Sample {
    let mut sample = numeric_sample(timestamp, &[("cpu_temperature", 45.2), ("load_average", 0.75)]);
    sample.insert("throttled_state", Reading::new(ResolvedValue::Text("0x0".into())));
    sample.insert("network", Reading::new(ResolvedValue::Structured(json!({"eth0": {"rx_bytes": 1024}}))));
    sample.insert("core_voltage", Reading::unavailable());
    sample.insert("disk_percent", Reading::stale(ResolvedValue::Numeric(41.0)));
    sample
}

async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("history.db")).await.unwrap()
}

#[test]
fn test_ring_buffer_evicts_oldest_first() {
    let mut ring = RingBuffer::new(3);
    for ts in 1..=5 {
        ring.push(numeric_sample(ts, &[("m", ts as f64)]));
    }

    assert_eq!(ring.len(), 3);
    assert_eq!(ring.oldest_timestamp(), Some(3));
    assert_eq!(ring.newest_timestamp(), Some(5));
    assert_eq!(ring.evicted(), 2);
    let kept: Vec<i64> = ring.iter().map(|s| s.timestamp).collect();
    assert_eq!(kept, vec![3, 4, 5]);
}

#[test]
fn test_ring_buffer_never_exceeds_capacity() {
    let mut ring = RingBuffer::new(100);
    for ts in 0..10_000 {
        ring.push(numeric_sample(ts, &[("m", 1.0)]));
        assert!(ring.len() <= 100);
    }
    assert_eq!(ring.oldest_timestamp(), Some(9_900));
}

#[test]
fn test_ring_buffer_moves_backwards_timestamps_past_newest() {
    let mut ring = RingBuffer::new(10);
    ring.push(numeric_sample(5_000, &[]));
    let stepped_back = ring.push(numeric_sample(4_000, &[]));
    let same_millisecond = ring.push(numeric_sample(5_001, &[]));

    assert_eq!(stepped_back.timestamp, 5_001);
    assert_eq!(same_millisecond.timestamp, 5_002);
    let timestamps: Vec<i64> = ring.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![5_000, 5_001, 5_002]);
}

#[tokio::test(start_paused = true)]
async fn test_clock_step_does_not_overwrite_durable_rows() {
    let store = Arc::new(FlakyStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (history, tasks) = HistoryStore::with_store(store.clone(), HistoryOptions::default(), shutdown_rx);

    let base = now_millis();

    history.ingest(numeric_sample(base, &[("m", 1.0)]));
    history.ingest(numeric_sample(base - 1_000, &[("m", 2.0)]));
    shutdown_tx.send(true).unwrap();
    tasks.join().await;

    assert_eq!(store.timestamps(), vec![base, base + 1]);
}

#[test]
fn test_ring_buffer_range_is_inclusive() {
    let mut ring = RingBuffer::new(10);
    for ts in [10, 20, 30, 40] {
        ring.push(numeric_sample(ts, &[]));
    }
    let got: Vec<i64> = ring.range(20, 30).iter().map(|s| s.timestamp).collect();
    assert_eq!(got, vec![20, 30]);
    assert!(ring.range(50, 60).is_empty());
    assert!(ring.range(30, 20).is_empty());
}

#[test]
fn test_in_memory_history_has_no_durable_tier() {
    let history = HistoryStore::in_memory(2);
    history.ingest(numeric_sample(1, &[("m", 1.0)]));
    history.ingest(numeric_sample(2, &[("m", 2.0)]));
    history.ingest(numeric_sample(3, &[("m", 3.0)]));

    assert!(history.durable().is_none());
    assert_eq!(history.latest().unwrap().timestamp, 3);
    let stats = history.stats();
    assert_eq!(stats.ring_len, 2);
    assert_eq!(stats.oldest, Some(2));
}

#[tokio::test]
async fn test_sqlite_round_trip_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let samples = vec![mixed_sample(1_700_000_000_000), mixed_sample(1_700_000_005_000)];

    store.append(&samples).await.unwrap();
    let read = store.range(1_700_000_000_000, 1_700_000_005_000).await.unwrap();

    assert_eq!(read, samples);
}

#[tokio::test]
async fn test_sqlite_append_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let batch = vec![numeric_sample(1_000, &[("m", 1.0)]), numeric_sample(2_000, &[("m", 2.0)])];

    store.append(&batch).await.unwrap();
    store.append(&batch).await.unwrap();

    assert_eq!(store.range(0, 10_000).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sqlite_range_bounds_and_delete_before() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let batch: Vec<Sample> = (0..10).map(|i| numeric_sample(i * 1_000, &[("m", i as f64)])).collect();
    store.append(&batch).await.unwrap();

    let middle: Vec<i64> = store.range(3_000, 5_000).await.unwrap().iter().map(|s| s.timestamp).collect();
    assert_eq!(middle, vec![3_000, 4_000, 5_000]);

    assert_eq!(store.delete_before(4_000).await.unwrap(), 4);
    assert_eq!(store.range(0, 10_000).await.unwrap().first().unwrap().timestamp, 4_000);
}

#[tokio::test]
async fn test_sqlite_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(&dir).await;
        store.append(&[numeric_sample(42_000, &[("m", 4.2)])]).await.unwrap();
        store.close().await;
    }
    let reopened = open_store(&dir).await;
    assert_eq!(reopened.range(0, i64::MAX).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_compaction_aligns_to_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let minute = 60_000;
    let bucket = 5 * minute;
    // one sample per minute for 20 minutes starting on a bucket boundary
    let base = 1_700_000_100_000 - 1_700_000_100_000 % bucket;
    let batch: Vec<Sample> =
        (0..20).map(|i| numeric_sample(base + i * minute, &[("m", i as f64)])).collect();
    store.append(&batch).await.unwrap();

    // 12 minutes in: only the first two buckets are complete
    let written = store.compact(base + 12 * minute, bucket).await.unwrap();
    assert_eq!(written, 2);

    let rows = store.range(base, base + 20 * minute).await.unwrap();
    assert_eq!(rows[0].timestamp, base);
    assert_eq!(rows[0].get("m").unwrap().value, ResolvedValue::Numeric(2.0));
    assert_eq!(rows[1].timestamp, base + bucket);
    assert_eq!(rows[1].get("m").unwrap().value, ResolvedValue::Numeric(7.0));
    assert_eq!(rows[2].timestamp, base + 10 * minute);
    assert_eq!(rows.len(), 2 + 10);

    assert_eq!(store.compact(base + 12 * minute, bucket).await.unwrap(), 0, "buckets must not be compacted twice");
}

#[tokio::test]
async fn test_cleanup_pass_deletes_and_compacts() {
    let store = FlakyStore::new();
    let now = now_millis();
    let day = 86_400_000;
    store.append(&[numeric_sample(now - 8 * day, &[("m", 1.0)]), numeric_sample(now, &[("m", 2.0)])]).await.unwrap();

    let policy = CleanupPolicy {
        interval: Duration::from_secs(3600),
        max_age: Duration::from_secs(7 * 86_400),
        downsample_after: Duration::from_secs(2 * 86_400),
        downsample_bucket: Duration::from_secs(300),
    };
    apply(&store, &policy, now).await;

    assert_eq!(store.timestamps(), vec![now]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_retried_without_loss() {
    let store = Arc::new(FlakyStore::new());
    store.fail_appends(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let options = HistoryOptions {
        ring_capacity: 1_000,
        flush_interval: Duration::from_secs(5),
        flush_batch: 100,
        ..Default::default()
    };
    let (history, tasks) = HistoryStore::with_store(store.clone(), options, shutdown_rx);
    let base = now_millis();

    for i in 0..3 {
        history.ingest(numeric_sample(base + i * 5_000, &[("m", i as f64)]));
    }
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(store.timestamps().is_empty());
    let status = history.persistence_status();
    assert_eq!(status.failed_flushes, 1);
    assert_eq!(status.backlog, 3);
    assert!(status.last_error.is_some());
    assert_eq!(history.memory_range(i64::MIN, i64::MAX).len(), 3, "ring buffer must keep its copy");

    for i in 3..5 {
        history.ingest(numeric_sample(base + i * 5_000, &[("m", i as f64)]));
    }
    tokio::time::sleep(Duration::from_secs(5)).await;

    let expected: Vec<i64> = (0..5).map(|i| base + i * 5_000).collect();
    assert_eq!(store.timestamps(), expected);
    let status = history.persistence_status();
    assert_eq!(status.persisted, 5);
    assert_eq!(status.backlog, 0);
    assert!(status.last_error.is_none());

    shutdown_tx.send(true).unwrap();
    tasks.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_backlog() {
    let store = Arc::new(FlakyStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let options = HistoryOptions { flush_interval: Duration::from_secs(60), ..Default::default() };
    let (history, tasks) = HistoryStore::with_store(store.clone(), options, shutdown_rx);
    let base = now_millis();

    for i in 0..4 {
        history.ingest(numeric_sample(base + i, &[("m", 1.0)]));
    }
    shutdown_tx.send(true).unwrap();
    tasks.join().await;

    assert_eq!(store.timestamps().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_full_batches_flush_before_the_interval() {
    let store = Arc::new(FlakyStore::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let options = HistoryOptions { flush_interval: Duration::from_secs(3600), flush_batch: 2, ..Default::default() };
    let (history, _tasks) = HistoryStore::with_store(store.clone(), options, shutdown_rx);
    let base = now_millis();

    history.ingest(numeric_sample(base, &[("m", 1.0)]));
    history.ingest(numeric_sample(base + 1, &[("m", 1.0)]));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(store.timestamps().len(), 2);
}
