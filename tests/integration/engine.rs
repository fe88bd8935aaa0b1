use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use host_pulse::core::{MetricValue, ResolvedValue};
use host_pulse::registry::{MetricSpec, OutputParser, ProbeSpec};
use host_pulse::sampler::collect_sample;

use crate::common::{file_metric, shell_metric, write_probe_file, Stub, StubExecutor, TestEngineBuilder};

fn approx(value: &ResolvedValue, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-9)
}

#[tokio::test]
async fn test_fallback_chain_over_real_probes() {
    let dir = tempfile::tempdir().unwrap();
    let present = write_probe_file(dir.path(), "temp", "48312\n");
    let missing = dir.path().join("absent");
    let metric = MetricSpec::numeric("cpu_temperature", "°C")
        .probe(ProbeSpec::file(&missing, OutputParser::Number { scale: 0.001 }))
        .probe(ProbeSpec::command("sh", &["-c", "exit 3"], OutputParser::Number { scale: 0.001 }))
        .probe(ProbeSpec::file(&present, OutputParser::Number { scale: 0.001 }));
    let engine = TestEngineBuilder::new().metric(metric).build_in_memory();

    let resolution = engine.cache.get_or_resolve("cpu_temperature").await.unwrap();

    assert!(approx(&resolution.value, 48.312), "got {:?}", resolution.value);
    assert!(!resolution.stale);
}

#[tokio::test]
async fn test_command_output_is_parsed() {
    let engine = TestEngineBuilder::new().metric(shell_metric("load_average", "", "echo 0.42")).build_in_memory();

    let resolution = engine.cache.get_or_resolve("load_average").await.unwrap();

    assert!(approx(&resolution.value, 0.42));
}

#[tokio::test]
async fn test_hanging_probe_is_cut_off_and_next_probe_used() {
    let metric = MetricSpec::numeric("core_voltage", "V")
        .probe(ProbeSpec::command("sh", &["-c", "sleep 30"], OutputParser::number()).with_timeout(Duration::from_millis(200)))
        .probe(ProbeSpec::command("sh", &["-c", "echo 1.2"], OutputParser::number()));
    let engine = TestEngineBuilder::new().metric(metric).build_in_memory();

    let started = Instant::now();
    let resolution = engine.cache.get_or_resolve("core_voltage").await.unwrap();

    assert!(approx(&resolution.value, 1.2));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_unresolvable_metrics_stay_in_the_sample() {
    let dir = tempfile::tempdir().unwrap();
    let present = write_probe_file(dir.path(), "temp", "40000");
    let engine = TestEngineBuilder::new()
        .metric(file_metric("cpu_temperature", &[present.as_path()]))
        .metric(file_metric("gpu_temperature", &[dir.path().join("nope").as_path()]))
        .build_in_memory();

    let sample = collect_sample(&engine.cache).await;

    assert_eq!(sample.len(), 2);
    assert!(approx(&sample.get("cpu_temperature").unwrap().value, 40.0));
    assert_eq!(sample.get("gpu_temperature").unwrap().value, ResolvedValue::Unavailable);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_execution() {
    let executor = Arc::new(StubExecutor::new());
    executor.stub("command:slow", Stub::Slow(Duration::from_millis(100), MetricValue::Numeric(3.0)));
    let metric = MetricSpec::numeric("throttle", "").probe(ProbeSpec::command("slow", &[], OutputParser::number()));
    let engine = TestEngineBuilder::new().executor(executor.clone()).metric(metric).build_in_memory();

    let results = join_all((0..20).map(|_| engine.cache.get_or_resolve("throttle"))).await;

    assert!(results.iter().all(|r| r.as_ref().unwrap().value == ResolvedValue::Numeric(3.0)));
    assert_eq!(executor.calls("command:slow"), 1);
}
