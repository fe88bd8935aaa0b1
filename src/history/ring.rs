use std::collections::VecDeque;

use crate::core::metrics::Sample;

/// Fixed-capacity, time-ordered buffer of the most recent samples
///
/// Appending past capacity evicts the oldest sample. Timestamps are kept strictly
/// increasing: a sample not newer than the newest one held (wall clock stepped backwards,
/// or two ticks in the same millisecond) is moved to one millisecond after it, so no
/// two samples share the `(timestamp, metric)` key of the durable table.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    evicted: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity.min(4096)), capacity, evicted: 0 }
    }

    /// Appends `sample`, returning it as stored
    pub fn push(&mut self, mut sample: Sample) -> Sample {
        if let Some(newest) = self.newest_timestamp() {
            if sample.timestamp <= newest {
                sample.timestamp = newest + 1;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
        self.samples.push_back(sample.clone());
        sample
    }

    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.samples.front().map(|s| s.timestamp)
    }

    pub fn newest_timestamp(&self) -> Option<i64> {
        self.samples.back().map(|s| s.timestamp)
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Samples with `from <= timestamp <= to`, oldest first
    pub fn range(&self, from: i64, to: i64) -> Vec<Sample> {
        let start = self.samples.partition_point(|s| s.timestamp < from);
        let end = self.samples.partition_point(|s| s.timestamp <= to);
        self.samples.range(start..end.max(start)).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples dropped to make room since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
