//! Usage ledger
//!
//! Append-only, capped history of resource-usage samples per
//! (module, tenant) pair, plus the resource limits and derived performance
//! metrics every other component reads from. Each pair is locked
//! independently so recording for one tenant never blocks readers of
//! another.

mod buffer;
mod performance;

pub use buffer::{UsageBuffer, DEFAULT_HISTORY_CAPACITY};
pub use performance::{error_rate, METRICS_WINDOW};

use crate::error::{validate_id, validate_tenant, Result};
use crate::models::{PerformanceMetrics, ResourceLimits, UsageSample};
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

/// Number of samples returned per tenant by `get_usage`
pub const RECENT_SAMPLES: usize = 10;

type SeriesKey = (String, String);

/// Per-(module, tenant) usage history with limits and derived metrics
pub struct UsageLedger {
    series: DashMap<SeriesKey, UsageBuffer>,
    metrics: DashMap<String, PerformanceMetrics>,
    module_limits: DashMap<String, ResourceLimits>,
    default_limits: ResourceLimits,
    capacity: usize,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::with_settings(ResourceLimits::default(), DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_settings(default_limits: ResourceLimits, capacity: usize) -> Self {
        Self {
            series: DashMap::new(),
            metrics: DashMap::new(),
            module_limits: DashMap::new(),
            default_limits,
            capacity,
        }
    }

    /// Append a sample and refresh the module's performance metrics
    pub fn record_usage(&self, sample: UsageSample) -> Result<()> {
        validate_id("module_id", &sample.module_id)?;
        validate_id("tenant_id", &sample.tenant_id)?;

        let module_id = sample.module_id.clone();
        let key = (sample.module_id.clone(), sample.tenant_id.clone());
        let limits = self.limits_for(&module_id);

        // Compute while holding only this pair's entry
        let metrics = {
            let mut buffer = self
                .series
                .entry(key)
                .or_insert_with(|| UsageBuffer::new(self.capacity));
            buffer.push(sample);
            performance::compute(&module_id, &buffer.recent(METRICS_WINDOW), &limits, Utc::now())
        };

        debug!(
            module_id = %module_id,
            efficiency = metrics.resource_efficiency,
            scaling_score = metrics.scaling_score,
            "Recorded usage sample"
        );
        self.metrics.insert(module_id, metrics);
        Ok(())
    }

    /// Most recent samples for a pair, or the most recent per tenant
    /// concatenated across every tenant of the module
    pub fn get_usage(&self, module_id: &str, tenant_id: Option<&str>) -> Result<Vec<UsageSample>> {
        validate_id("module_id", module_id)?;
        validate_tenant(tenant_id)?;

        match tenant_id {
            Some(tenant) => Ok(self
                .series
                .get(&(module_id.to_string(), tenant.to_string()))
                .map(|b| b.recent(RECENT_SAMPLES))
                .unwrap_or_default()),
            None => {
                let mut per_tenant: Vec<(String, Vec<UsageSample>)> = self
                    .series
                    .iter()
                    .filter(|entry| entry.key().0 == module_id)
                    .map(|entry| (entry.key().1.clone(), entry.value().recent(RECENT_SAMPLES)))
                    .collect();
                per_tenant.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(per_tenant.into_iter().flat_map(|(_, s)| s).collect())
            }
        }
    }

    /// Full retained history; module-wide results are merged in time order
    pub fn history(&self, module_id: &str, tenant_id: Option<&str>) -> Result<Vec<UsageSample>> {
        validate_id("module_id", module_id)?;
        validate_tenant(tenant_id)?;

        match tenant_id {
            Some(tenant) => Ok(self
                .series
                .get(&(module_id.to_string(), tenant.to_string()))
                .map(|b| b.all())
                .unwrap_or_default()),
            None => {
                let mut merged: Vec<UsageSample> = self
                    .series
                    .iter()
                    .filter(|entry| entry.key().0 == module_id)
                    .flat_map(|entry| entry.value().all())
                    .collect();
                merged.sort_by_key(|s| s.timestamp);
                Ok(merged)
            }
        }
    }

    /// Full history of every tenant of a module, keyed by tenant in name order
    pub fn tenant_histories(&self, module_id: &str) -> Result<Vec<(String, Vec<UsageSample>)>> {
        validate_id("module_id", module_id)?;
        let mut histories: Vec<(String, Vec<UsageSample>)> = self
            .series
            .iter()
            .filter(|entry| entry.key().0 == module_id)
            .map(|entry| (entry.key().1.clone(), entry.value().all()))
            .collect();
        histories.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(histories)
    }

    pub fn latest(&self, module_id: &str, tenant_id: &str) -> Result<Option<UsageSample>> {
        validate_id("module_id", module_id)?;
        validate_id("tenant_id", tenant_id)?;
        Ok(self
            .series
            .get(&(module_id.to_string(), tenant_id.to_string()))
            .and_then(|b| b.latest().cloned()))
    }

    /// True when the latest sample exceeds any memory, cpu, storage or
    /// concurrent-request limit
    pub fn is_over_limit(&self, module_id: &str, tenant_id: &str) -> Result<bool> {
        let Some(latest) = self.latest(module_id, tenant_id)? else {
            return Ok(false);
        };
        let limits = self.limits_for(module_id);

        Ok(latest.memory_usage > limits.memory
            || latest.cpu_usage / 100.0 > limits.cpu
            || latest.storage_usage > limits.storage
            || latest.active_requests > limits.concurrent_requests)
    }

    pub fn performance_metrics(&self, module_id: &str) -> Option<PerformanceMetrics> {
        self.metrics.get(module_id).map(|m| m.clone())
    }

    pub fn set_module_limits(&self, module_id: &str, limits: ResourceLimits) -> Result<()> {
        validate_id("module_id", module_id)?;
        self.module_limits.insert(module_id.to_string(), limits);
        Ok(())
    }

    /// Module override if present, otherwise the global default
    pub fn limits_for(&self, module_id: &str) -> ResourceLimits {
        self.module_limits
            .get(module_id)
            .map(|l| *l)
            .unwrap_or(self.default_limits)
    }

    /// Number of (module, tenant) series tracked
    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}
