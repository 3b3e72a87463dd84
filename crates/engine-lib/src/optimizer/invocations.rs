//! Per-tenant module invocation history

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

/// Timestamps kept per (tenant, module); oldest are evicted first
pub const MAX_INVOCATIONS_PER_MODULE: usize = 1000;

/// Bounded invocation timestamps keyed by (tenant, module)
pub struct InvocationLog {
    entries: DashMap<(String, String), VecDeque<DateTime<Utc>>>,
    capacity: usize,
}

impl Default for InvocationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_INVOCATIONS_PER_MODULE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, tenant_id: &str, module_id: &str, at: DateTime<Utc>) {
        let mut entry = self
            .entries
            .entry((tenant_id.to_string(), module_id.to_string()))
            .or_default();
        while entry.len() >= self.capacity {
            entry.pop_front();
        }
        entry.push_back(at);
    }

    pub fn len(&self, tenant_id: &str, module_id: &str) -> usize {
        self.with_entry(tenant_id, module_id, |ts| ts.len())
    }

    /// Most recent invocation
    pub fn last_used(&self, tenant_id: &str, module_id: &str) -> Option<DateTime<Utc>> {
        self.with_entry(tenant_id, module_id, |ts| ts.iter().max().copied())
    }

    /// Invocations at or after `since`
    pub fn count_since(&self, tenant_id: &str, module_id: &str, since: DateTime<Utc>) -> usize {
        self.with_entry(tenant_id, module_id, |ts| ts.iter().filter(|t| **t >= since).count())
    }

    /// Invocations whose hour of day is within `radius` hours of `hour`,
    /// wrapping around midnight
    pub fn count_near_hour(&self, tenant_id: &str, module_id: &str, hour: u32, radius: u32) -> usize {
        self.with_entry(tenant_id, module_id, |ts| {
            ts.iter()
                .filter(|t| hour_distance(t.hour(), hour) <= radius)
                .count()
        })
    }

    fn with_entry<T: Default>(
        &self,
        tenant_id: &str,
        module_id: &str,
        f: impl FnOnce(&VecDeque<DateTime<Utc>>) -> T,
    ) -> T {
        self.entries
            .get(&(tenant_id.to_string(), module_id.to_string()))
            .map(|entry| f(entry.value()))
            .unwrap_or_default()
    }
}

fn hour_distance(a: u32, b: u32) -> u32 {
    let d = (a as i32 - b as i32).rem_euclid(24) as u32;
    d.min(24 - d)
}
