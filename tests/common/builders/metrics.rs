use std::path::Path;

use host_pulse::registry::{MetricSpec, OutputParser, ProbeSpec};

/// Writes `contents` to `dir/name` and returns the path, for file probes
pub fn write_probe_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// A millidegree temperature read from the first existing file of `paths`
pub fn file_metric(name: &str, paths: &[&Path]) -> MetricSpec {
    paths.iter().fold(MetricSpec::numeric(name, "°C"), |spec, path| {
        spec.probe(ProbeSpec::file(*path, OutputParser::Number { scale: 0.001 }))
    })
}

/// Numeric metric backed by `sh -c script`
pub fn shell_metric(name: &str, unit: &str, script: &str) -> MetricSpec {
    MetricSpec::numeric(name, unit).probe(ProbeSpec::command("sh", &["-c", script], OutputParser::number()))
}
