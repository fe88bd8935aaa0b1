//! Probe registry
//!
//! The registry maps each metric name to its [`MetricSpec`]: unit, value kind and the
//! ordered list of probes to try. It is built once at startup and never mutated, so
//! adding a metric is a declaration change here (or in the config file) and nothing
//! else in the engine has to know about it.
//!
//! # Examples
//!
//! ```rust
//! use host_pulse::registry::ProbeRegistry;
//!
//! let registry = ProbeRegistry::builtin().unwrap();
//! let spec = registry.spec_for("cpu_temperature").unwrap();
//! assert!(spec.serve_stale);
//! assert!(registry.spec_for("no_such_metric").is_err());
//! ```

mod builtin;
pub mod constants;
pub mod types;


use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

pub use builtin::builtin_metrics;
pub use types::{CostClass, MemInfoField, MetricSpec, OutputParser, ProbeKind, ProbeSpec, Syscall};

/// Read-only lookup table of metric declarations, in declaration order
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    specs: Vec<Arc<MetricSpec>>,
    index: HashMap<String, usize>,
}

impl ProbeRegistry {
    /// Builds a registry, rejecting duplicate names, empty names and empty probe chains
    pub fn new(specs: Vec<MetricSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            validate(spec)?;
            if index.insert(spec.name.clone(), position).is_some() {
                return Err(Error::invalid_config(format!("metric `{}` declared twice", spec.name)));
            }
        }
        Ok(Self { specs: specs.into_iter().map(Arc::new).collect(), index })
    }

    /// The built-in metric set, validated like any other declaration
    pub fn builtin() -> Result<Self> {
        Self::new(builtin_metrics())
    }

    /// Built-in metrics plus `extra`; an extra metric with a built-in name replaces it in place
    pub fn with_overrides(extra: Vec<MetricSpec>) -> Result<Self> {
        let mut specs = builtin_metrics();
        for spec in extra {
            match specs.iter_mut().find(|existing| existing.name == spec.name) {
                Some(existing) => *existing = spec,
                None => specs.push(spec),
            }
        }
        Self::new(specs)
    }

    pub fn spec_for(&self, name: &str) -> Result<Arc<MetricSpec>> {
        self.index.get(name).map(|&i| Arc::clone(&self.specs[i])).ok_or_else(|| Error::unknown_metric(name))
    }

    /// Metric names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MetricSpec>> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn validate(spec: &MetricSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(Error::invalid_config("metric name must not be empty"));
    }
    if spec.probes.is_empty() {
        return Err(Error::invalid_config(format!("metric `{}` has no probes", spec.name)));
    }
    if let Some(probe) = spec.probes.iter().find(|p| p.parser.yields() != spec.kind) {
        return Err(Error::invalid_config(format!(
            "metric `{}` is {} but probe `{}` yields {}",
            spec.name,
            spec.kind,
            probe.label(),
            probe.parser.yields()
        )));
    }
    Ok(())
}
