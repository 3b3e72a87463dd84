//! Bounded per-key usage history
//!
//! A FIFO ring over `UsageSample`s: once the configured capacity is reached
//! the oldest sample is evicted to make room for the newest.

use crate::models::UsageSample;
use std::collections::VecDeque;

/// Default number of samples retained per (module, tenant) pair
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Ring buffer of usage samples for one (module, tenant) pair
#[derive(Debug, Clone)]
pub struct UsageBuffer {
    samples: VecDeque<UsageSample>,
    capacity: usize,
}

impl UsageBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest entries past capacity
    pub fn push(&mut self, sample: UsageSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// The most recent `limit` samples, oldest first
    pub fn recent(&self, limit: usize) -> Vec<UsageSample> {
        let skip = self.samples.len().saturating_sub(limit);
        self.samples.iter().skip(skip).cloned().collect()
    }

    /// Every retained sample, oldest first
    pub fn all(&self) -> Vec<UsageSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&UsageSample> {
        self.samples.back()
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
}

impl Default for UsageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(i: i64) -> UsageSample {
        UsageSample {
            module_id: "m".to_string(),
            tenant_id: "t".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
            memory_usage: 100.0,
            cpu_usage: i as f64,
            storage_usage: 10.0,
            network_usage: 1.0,
            active_requests: 1,
            response_time: 50.0,
            error_count: 0,
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut buffer = UsageBuffer::new(3);
        for i in 0..5 {
            buffer.push(sample(i));
        }
        assert_eq!(buffer.len(), 3);
        let cpus: Vec<f64> = buffer.all().iter().map(|s| s.cpu_usage).collect();
        assert_eq!(cpus, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.latest().unwrap().cpu_usage, 4.0);
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut buffer = UsageBuffer::default();
        for i in 0..25 {
            buffer.push(sample(i));
        }
        let recent = buffer.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].cpu_usage, 15.0);
        assert_eq!(recent[9].cpu_usage, 24.0);
    }

    #[test]
    fn test_recent_with_short_history() {
        let mut buffer = UsageBuffer::default();
        buffer.push(sample(0));
        assert_eq!(buffer.recent(10).len(), 1);
        assert!(UsageBuffer::default().recent(10).is_empty());
    }

    #[test]
    fn test_default_capacity() {
        let mut buffer = UsageBuffer::default();
        for i in 0..1005 {
            buffer.push(sample(i));
        }
        assert_eq!(buffer.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(buffer.all()[0].cpu_usage, 5.0);
    }
}
