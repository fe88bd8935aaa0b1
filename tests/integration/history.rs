use std::sync::Arc;
use std::time::Duration;

use host_pulse::core::{now_millis, MetricValue, Reading, ResolvedValue, Sample};
use host_pulse::registry::{MetricSpec, OutputParser, ProbeSpec};
use host_pulse::sampler::Sampler;
use host_pulse::traits::SampleStore;
use tokio::sync::watch;

use crate::common::{Stub, StubExecutor, TestEngineBuilder};

fn sample(timestamp: i64, value: f64) -> Sample {
    let mut sample = Sample::new(timestamp);
    sample.insert("load_average", Reading::new(ResolvedValue::Numeric(value)));
    sample
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let base = now_millis() - 600_000;

    let durable = TestEngineBuilder::new().build_durable(&path).await;
    for i in 0..5 {
        durable.engine.history.ingest(sample(base + i * 5_000, i as f64));
    }
    durable.shutdown.send(true).unwrap();
    durable.tasks.join().await;
    assert_eq!(durable.store.range(base, base + 20_000).await.unwrap().len(), 5);
    durable.store.close().await;

    // the new process starts with an empty ring buffer
    let restarted = TestEngineBuilder::new().build_durable(&path).await;
    assert!(restarted.engine.history.latest().is_none());
    let result = restarted.engine.query.query(base, base + 20_000, None).await;

    assert!(!result.partial);
    let timestamps: Vec<i64> = result.buckets.iter().map(|b| b.timestamp).collect();
    assert_eq!(timestamps, (0..5).map(|i| base + i * 5_000).collect::<Vec<_>>());
    assert_eq!(result.buckets[3].values["load_average"].value, ResolvedValue::Numeric(3.0));

    restarted.shutdown.send(true).unwrap();
    restarted.tasks.join().await;
}

#[tokio::test]
async fn test_sampler_feeds_both_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(StubExecutor::new());
    executor.stub("command:uptime", Stub::Value(MetricValue::Numeric(0.25)));
    let durable = TestEngineBuilder::new()
        .executor(executor)
        .metric(MetricSpec::numeric("load_average", "").probe(ProbeSpec::command("uptime", &[], OutputParser::number())))
        .build_durable(&dir.path().join("history.db"))
        .await;

    let sampler = Sampler::new(durable.engine.cache.clone(), durable.engine.history.clone(), Duration::from_millis(50));
    let stats = sampler.stats();
    let (stop_sampler, sampler_rx) = watch::channel(false);
    let handle = tokio::spawn(sampler.run(sampler_rx));
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop_sampler.send(true).unwrap();
    handle.await.unwrap();

    durable.shutdown.send(true).unwrap();
    durable.tasks.join().await;

    let ticks = stats.snapshot().ticks as usize;
    assert!(ticks >= 2, "only {ticks} ticks");
    assert_eq!(durable.engine.history.stats().ring_len, ticks);
    let stored = durable.store.range(0, i64::MAX).await.unwrap();
    assert_eq!(stored.len(), ticks);
    assert!(stored.iter().all(|s| s.get("load_average").unwrap().value == ResolvedValue::Numeric(0.25)));
}
