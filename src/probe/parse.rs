use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::core::types::MetricValue;
use crate::error::{Error, Result};
use crate::registry::{MemInfoField, OutputParser};

impl OutputParser {
    /// Parses raw probe output, attributing failures to `probe`
    ///
    /// Non-finite numbers are rejected so a `NaN` never reaches the cache.
    pub fn parse(&self, probe: &str, raw: &str) -> Result<MetricValue> {
        let fail = |reason: String| Error::probe_parse(probe, reason);
        match self {
            Self::Number { scale } => number(raw.trim()).map(|v| MetricValue::Numeric(v * scale)).map_err(fail),
            Self::FirstNumber { scale } => raw
                .split_whitespace()
                .find_map(|token| number(token).ok())
                .map(|v| MetricValue::Numeric(v * scale))
                .ok_or_else(|| fail(format!("no number in {:?}", truncate(raw)))),
            Self::Prefixed { prefix, scale } => {
                let start = raw
                    .find(prefix.as_str())
                    .ok_or_else(|| fail(format!("prefix {prefix:?} not found in {:?}", truncate(raw))))?;
                let rest = &raw[start + prefix.len()..];
                let end = rest
                    .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
                    .unwrap_or(rest.len());
                number(&rest[..end]).map(|v| MetricValue::Numeric(v * scale)).map_err(fail)
            }
            Self::Column { line, column, scale } => {
                let cell = raw
                    .lines()
                    .nth(*line)
                    .and_then(|l| l.split_whitespace().nth(*column))
                    .ok_or_else(|| fail(format!("no cell at line {line}, column {column}")))?;
                number(cell.trim_end_matches('%')).map(|v| MetricValue::Numeric(v * scale)).map_err(fail)
            }
            Self::Text { prefix } => {
                let trimmed = raw.trim();
                let text = match prefix {
                    Some(prefix) => trimmed
                        .strip_prefix(prefix.as_str())
                        .ok_or_else(|| fail(format!("expected prefix {prefix:?}")))?
                        .trim(),
                    None => trimmed,
                };
                if text.is_empty() {
                    return Err(fail("empty output".into()));
                }
                Ok(MetricValue::Text(text.to_string()))
            }
            Self::MemInfo { field } => mem_info(raw, *field).map(MetricValue::Numeric).map_err(fail),
            Self::NetDev => net_dev(raw).map(MetricValue::Structured).map_err(fail),
            Self::Json => serde_json::from_str(raw.trim())
                .map(MetricValue::Structured)
                .map_err(|e| fail(e.to_string())),
        }
    }
}

fn number(token: &str) -> std::result::Result<f64, String> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(format!("non-finite value {v}")),
        Err(_) => Err(format!("not a number: {:?}", truncate(token))),
    }
}

fn truncate(raw: &str) -> &str {
    match raw.char_indices().nth(64) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// `/proc/meminfo` values, in kB
fn mem_table(raw: &str) -> HashMap<&str, f64> {
    raw.lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let value = rest.split_whitespace().next()?.parse::<f64>().ok()?;
            Some((key.trim(), value))
        })
        .collect()
}

fn mem_info(raw: &str, field: MemInfoField) -> std::result::Result<f64, String> {
    let table = mem_table(raw);
    let get = |key: &str| table.get(key).copied().ok_or_else(|| format!("{key} missing"));

    let total = get("MemTotal")?;
    let available = get("MemAvailable").or_else(|_| -> std::result::Result<f64, String> {
        Ok(get("MemFree")? + get("Buffers").unwrap_or(0.0) + get("Cached").unwrap_or(0.0))
    })?;
    let used = (total - available).max(0.0);

    match field {
        MemInfoField::UsedPercent if total > 0.0 => Ok(used / total * 100.0),
        MemInfoField::UsedPercent => Err("MemTotal is zero".into()),
        MemInfoField::UsedBytes => Ok(used * 1024.0),
        MemInfoField::TotalBytes => Ok(total * 1024.0),
        MemInfoField::SwapUsedPercent => {
            let swap_total = get("SwapTotal")?;
            if swap_total <= 0.0 {
                return Ok(0.0);
            }
            Ok((swap_total - get("SwapFree")?).max(0.0) / swap_total * 100.0)
        }
    }
}

/// Per-interface cumulative counters from `/proc/net/dev`
///
/// Columns after the interface name: eight receive counters, then eight transmit counters.
fn net_dev(raw: &str) -> std::result::Result<Value, String> {
    let mut interfaces = Map::new();
    for line in raw.lines() {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<u64> = counters.split_whitespace().filter_map(|f| f.parse().ok()).collect();
        if fields.len() < 16 {
            continue;
        }
        interfaces.insert(
            name.trim().to_string(),
            json!({
                "rx_bytes": fields[0],
                "rx_packets": fields[1],
                "rx_errors": fields[2],
                "tx_bytes": fields[8],
                "tx_packets": fields[9],
                "tx_errors": fields[10],
            }),
        );
    }
    if interfaces.is_empty() {
        return Err("no interfaces found".into());
    }
    Ok(Value::Object(interfaces))
}
