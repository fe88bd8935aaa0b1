use std::time::Duration;

use crate::registry::constants::*;
use crate::registry::types::{CostClass, MemInfoField, MetricSpec, OutputParser, ProbeSpec, Syscall};

/// The metric set every host starts with
///
/// Board-specific probes (`vcgencmd`) come first so hardware that has them reports
/// firmware-accurate readings; generic kernel interfaces are the fallback.
pub fn builtin_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::numeric("cpu_percent", "%")
            .describe("CPU busy time across all cores")
            .probe(
                ProbeSpec::syscall(Syscall::CpuUsage, OutputParser::number()).with_cost(CostClass::Moderate),
            )
            .probe(
                ProbeSpec::command("sh", &["-c", "top -bn1 | awk '/^%Cpu/ {print 100 - $8}'"], OutputParser::number())
                    .with_cost(CostClass::Expensive),
            )
            .ttl(Duration::from_secs(2)),
        MetricSpec::numeric("load_average", "")
            .describe("One minute load average")
            .probe(ProbeSpec::syscall(Syscall::LoadAverage, OutputParser::first_number()))
            .probe(ProbeSpec::file(PROC_LOADAVG, OutputParser::first_number())),
        MetricSpec::numeric("memory_percent", "%")
            .describe("Memory in use, excluding reclaimable cache")
            .probe(ProbeSpec::file(PROC_MEMINFO, OutputParser::MemInfo { field: MemInfoField::UsedPercent }))
            .probe(ProbeSpec::command(
                "sh",
                &["-c", "free | awk '/^Mem:/ {print $3/$2*100}'"],
                OutputParser::number(),
            )),
        MetricSpec::numeric("memory_used_bytes", "B")
            .describe("Memory in use in bytes")
            .probe(ProbeSpec::file(PROC_MEMINFO, OutputParser::MemInfo { field: MemInfoField::UsedBytes })),
        MetricSpec::numeric("swap_percent", "%")
            .describe("Swap in use")
            .probe(ProbeSpec::file(
                PROC_MEMINFO,
                OutputParser::MemInfo { field: MemInfoField::SwapUsedPercent },
            )),
        MetricSpec::numeric("disk_percent", "%")
            .describe("Root filesystem usage")
            .probe(ProbeSpec::syscall(Syscall::DiskUsage { path: "/".into() }, OutputParser::number()))
            .probe(ProbeSpec::command(
                "df",
                &["-P", "/"],
                OutputParser::Column { line: 1, column: 4, scale: 1.0 },
            ))
            .ttl(Duration::from_secs(30)),
        MetricSpec::numeric("cpu_temperature", "°C")
            .describe("SoC / CPU package temperature")
            .probe(ProbeSpec::command(VCGENCMD, &["measure_temp"], OutputParser::prefixed("temp=")))
            .probe(ProbeSpec::file(THERMAL_ZONE0_TEMP, OutputParser::Number { scale: 0.001 }))
            .probe(ProbeSpec::file(HWMON0_TEMP1, OutputParser::Number { scale: 0.001 }))
            .ttl(Duration::from_secs(10))
            .serve_stale(true),
        MetricSpec::numeric("cpu_frequency_mhz", "MHz")
            .describe("Current ARM / CPU0 clock")
            .probe(ProbeSpec::command(
                VCGENCMD,
                &["measure_clock", "arm"],
                OutputParser::Prefixed { prefix: "=".into(), scale: 1e-6 },
            ))
            .probe(ProbeSpec::file(CPU0_SCALING_CUR_FREQ, OutputParser::Number { scale: 0.001 })),
        MetricSpec::numeric("core_voltage", "V")
            .describe("SoC core voltage")
            .probe(ProbeSpec::command(VCGENCMD, &["measure_volts", "core"], OutputParser::prefixed("volt=")))
            .ttl(Duration::from_secs(30)),
        MetricSpec::text("throttled_state")
            .describe("Firmware throttling / under-voltage flags")
            .probe(ProbeSpec::command(
                VCGENCMD,
                &["get_throttled"],
                OutputParser::Text { prefix: Some("throttled=".into()) },
            ))
            .ttl(Duration::from_secs(30)),
        MetricSpec::structured("network")
            .describe("Cumulative byte counters per interface")
            .probe(ProbeSpec::file(PROC_NET_DEV, OutputParser::NetDev))
            .ttl(Duration::from_secs(2)),
        MetricSpec::numeric("uptime_seconds", "s")
            .describe("Time since boot")
            .probe(ProbeSpec::file(PROC_UPTIME, OutputParser::first_number())),
        MetricSpec::text("hostname")
            .describe("Host name")
            .probe(ProbeSpec::syscall(Syscall::Hostname, OutputParser::text()))
            .probe(ProbeSpec::file(ETC_HOSTNAME, OutputParser::text()))
            .ttl(Duration::from_secs(300)),
    ]
}
