use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::ValueKind;
use crate::registry::constants::{CHEAP_TTL, EXPENSIVE_TTL, MODERATE_TTL};

/// Relative cost of running a probe
///
/// Drives the default probe timeout and the default freshness window of the metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostClass {
    /// Kernel interface reads and cheap syscalls
    Cheap,
    /// Single short-lived subprocess
    #[default]
    Moderate,
    /// Multi-subprocess or slow hardware queries
    Expensive,
}

impl CostClass {
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Cheap => CHEAP_TTL,
            Self::Moderate => MODERATE_TTL,
            Self::Expensive => EXPENSIVE_TTL,
        }
    }
}

impl fmt::Display for CostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cheap => write!(f, "cheap"),
            Self::Moderate => write!(f, "moderate"),
            Self::Expensive => write!(f, "expensive"),
        }
    }
}

/// In-process system calls a probe can make instead of spawning a command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Syscall {
    /// `getloadavg(3)`, rendered as three space-separated averages
    LoadAverage,
    /// Two `/proc/stat` reads a short window apart, rendered as a busy percentage
    CpuUsage,
    /// `statvfs(3)` on `path`, rendered as a used percentage
    DiskUsage { path: PathBuf },
    /// `gethostname(2)`
    Hostname,
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadAverage => write!(f, "load_average"),
            Self::CpuUsage => write!(f, "cpu_usage"),
            Self::DiskUsage { path } => write!(f, "disk_usage({})", path.display()),
            Self::Hostname => write!(f, "hostname"),
        }
    }
}

/// How a probe obtains its raw output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeKind {
    /// Spawn `program` with `args` and capture stdout
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Read a file, typically under `/proc` or `/sys`
    File { path: PathBuf },
    /// Call into libc or the kernel from the blocking pool
    Syscall { call: Syscall },
}

/// Field derived from `/proc/meminfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemInfoField {
    /// `(MemTotal - MemAvailable) / MemTotal` as a percentage
    UsedPercent,
    /// `MemTotal - MemAvailable` in bytes
    UsedBytes,
    /// `MemTotal` in bytes
    TotalBytes,
    /// `(SwapTotal - SwapFree) / SwapTotal` as a percentage
    SwapUsedPercent,
}

fn unit_scale() -> f64 {
    1.0
}

/// Turns raw probe output into a typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputParser {
    /// Entire trimmed output is a number
    Number {
        #[serde(default = "unit_scale")]
        scale: f64,
    },
    /// First whitespace-separated token that parses as a number
    FirstNumber {
        #[serde(default = "unit_scale")]
        scale: f64,
    },
    /// Number immediately following `prefix` (e.g. `temp=45.2'C`)
    Prefixed {
        prefix: String,
        #[serde(default = "unit_scale")]
        scale: f64,
    },
    /// Whitespace table cell at `line`/`column` (zero-based), trailing `%` ignored
    Column {
        line: usize,
        column: usize,
        #[serde(default = "unit_scale")]
        scale: f64,
    },
    /// Trimmed text, optionally after `prefix`
    Text {
        #[serde(default)]
        prefix: Option<String>,
    },
    /// `/proc/meminfo` derived field
    MemInfo { field: MemInfoField },
    /// `/proc/net/dev` byte counters as a structured document
    NetDev,
    /// Output is a JSON document
    Json,
}

impl OutputParser {
    pub fn number() -> Self {
        Self::Number { scale: 1.0 }
    }

    pub fn first_number() -> Self {
        Self::FirstNumber { scale: 1.0 }
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::Prefixed { prefix: prefix.into(), scale: 1.0 }
    }

    pub fn text() -> Self {
        Self::Text { prefix: None }
    }

    /// The value kind this parser yields
    pub fn yields(&self) -> ValueKind {
        match self {
            Self::Number { .. }
            | Self::FirstNumber { .. }
            | Self::Prefixed { .. }
            | Self::Column { .. }
            | Self::MemInfo { .. } => ValueKind::Numeric,
            Self::Text { .. } => ValueKind::Text,
            Self::NetDev | Self::Json => ValueKind::Structured,
        }
    }
}

/// One candidate technique for obtaining a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub kind: ProbeKind,
    pub parser: OutputParser,
    #[serde(default)]
    pub cost: CostClass,
    /// Overrides the cost class timeout
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl ProbeSpec {
    pub fn command<S: Into<String>>(program: S, args: &[&str], parser: OutputParser) -> Self {
        Self {
            kind: ProbeKind::Command {
                program: program.into(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            parser,
            cost: CostClass::Moderate,
            timeout: None,
        }
    }

    pub fn file<P: Into<PathBuf>>(path: P, parser: OutputParser) -> Self {
        Self { kind: ProbeKind::File { path: path.into() }, parser, cost: CostClass::Cheap, timeout: None }
    }

    pub fn syscall(call: Syscall, parser: OutputParser) -> Self {
        Self { kind: ProbeKind::Syscall { call }, parser, cost: CostClass::Cheap, timeout: None }
    }

    pub fn with_cost(mut self, cost: CostClass) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable identifier used in logs and errors
    pub fn label(&self) -> String {
        match &self.kind {
            ProbeKind::Command { program, args } if args.is_empty() => format!("command:{program}"),
            ProbeKind::Command { program, args } => format!("command:{program} {}", args.join(" ")),
            ProbeKind::File { path } => format!("file:{}", path.display()),
            ProbeKind::Syscall { call } => format!("syscall:{call}"),
        }
    }
}

/// Declaration of a metric and its ordered fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub description: String,
    /// Most specific / cheapest first, generic OS interface last
    pub probes: Vec<ProbeSpec>,
    /// Freshness window; defaults from the most expensive probe's cost class
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    /// Serve the last good value (flagged stale) when every probe fails
    #[serde(default)]
    pub serve_stale: bool,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            kind,
            description: String::new(),
            probes: Vec::new(),
            ttl: None,
            serve_stale: false,
        }
    }

    pub fn numeric(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::new(name, unit, ValueKind::Numeric)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "", ValueKind::Text)
    }

    pub fn structured(name: impl Into<String>) -> Self {
        Self::new(name, "", ValueKind::Structured)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn probe(mut self, probe: ProbeSpec) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn serve_stale(mut self, enabled: bool) -> Self {
        self.serve_stale = enabled;
        self
    }

    /// Highest cost class among the probes
    pub fn cost(&self) -> CostClass {
        self.probes.iter().map(|p| p.cost).max().unwrap_or_default()
    }

    pub fn effective_ttl(&self) -> Duration {
        self.ttl.unwrap_or_else(|| self.cost().default_ttl())
    }
}
