//! Telemetry sources for health checks
//!
//! The monitor polls a `MetricsSource` for each instance on every tick.
//! Two implementations ship with the engine: fixed stub readings, and
//! readings derived from the usage ledger.

use super::checks::HealthReadings;
use crate::ledger::{error_rate, UsageLedger, METRICS_WINDOW};
use crate::models::{ModuleInstance, UsageSample};
use crate::stats::{mean, trend_ratio};
use anyhow::Result;
use std::sync::Arc;

/// Capability interface for instance telemetry
pub trait MetricsSource: Send + Sync {
    /// Response latency in milliseconds
    fn sample_latency(&self, instance: &ModuleInstance) -> Result<f64>;

    /// CPU as a percentage of one core
    fn sample_cpu(&self, instance: &ModuleInstance) -> Result<f64>;

    /// Fraction of failed requests, 0.0-1.0
    fn sample_error_rate(&self, instance: &ModuleInstance) -> Result<f64>;

    /// Uptime percentage, 0-100
    fn sample_uptime(&self, instance: &ModuleInstance) -> Result<f64>;

    /// Memory growth factor over the observation window
    fn sample_memory_growth(&self, instance: &ModuleInstance) -> Result<f64>;

    /// Gather every reading for an instance
    fn readings(&self, instance: &ModuleInstance) -> Result<HealthReadings> {
        Ok(HealthReadings {
            latency_ms: self.sample_latency(instance)?,
            cpu_percent: self.sample_cpu(instance)?,
            error_rate: self.sample_error_rate(instance)?,
            uptime_percent: self.sample_uptime(instance)?,
            memory_growth: self.sample_memory_growth(instance)?,
        })
    }
}

/// Returns the same readings for every instance
#[derive(Debug, Clone)]
pub struct StaticMetricsSource {
    readings: HealthReadings,
}

impl StaticMetricsSource {
    pub fn new(readings: HealthReadings) -> Self {
        Self { readings }
    }
}

impl Default for StaticMetricsSource {
    fn default() -> Self {
        Self::new(HealthReadings {
            latency_ms: 150.0,
            cpu_percent: 45.0,
            error_rate: 0.01,
            uptime_percent: 99.995,
            memory_growth: 1.05,
        })
    }
}

impl MetricsSource for StaticMetricsSource {
    fn sample_latency(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.readings.latency_ms)
    }

    fn sample_cpu(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.readings.cpu_percent)
    }

    fn sample_error_rate(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.readings.error_rate)
    }

    fn sample_uptime(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.readings.uptime_percent)
    }

    fn sample_memory_growth(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.readings.memory_growth)
    }
}

/// Derives readings from recorded usage samples
///
/// Latency, CPU and error rate come from the most recent samples; memory
/// growth compares the newest memory figure with the oldest in the metrics
/// window of each tenant, reporting the steepest tenant when no tenant is
/// given. The ledger has no notion of uptime, so a fixed value is reported.
pub struct LedgerMetricsSource {
    ledger: Arc<UsageLedger>,
    uptime_percent: f64,
}

impl LedgerMetricsSource {
    pub fn new(ledger: Arc<UsageLedger>) -> Self {
        Self {
            ledger,
            uptime_percent: 100.0,
        }
    }

    pub fn with_uptime(mut self, uptime_percent: f64) -> Self {
        self.uptime_percent = uptime_percent;
        self
    }

    fn recent(&self, instance: &ModuleInstance) -> Result<Vec<UsageSample>> {
        Ok(self
            .ledger
            .get_usage(&instance.module_id, instance.tenant_id.as_deref())?)
    }
}

impl MetricsSource for LedgerMetricsSource {
    fn sample_latency(&self, instance: &ModuleInstance) -> Result<f64> {
        let samples = self.recent(instance)?;
        let values: Vec<f64> = samples.iter().map(|s| s.response_time).collect();
        Ok(mean(&values))
    }

    fn sample_cpu(&self, instance: &ModuleInstance) -> Result<f64> {
        let samples = self.recent(instance)?;
        let values: Vec<f64> = samples.iter().map(|s| s.cpu_usage).collect();
        Ok(mean(&values))
    }

    fn sample_error_rate(&self, instance: &ModuleInstance) -> Result<f64> {
        Ok(error_rate(&self.recent(instance)?))
    }

    fn sample_uptime(&self, _instance: &ModuleInstance) -> Result<f64> {
        Ok(self.uptime_percent)
    }

    fn sample_memory_growth(&self, instance: &ModuleInstance) -> Result<f64> {
        match instance.tenant_id.as_deref() {
            Some(tenant) => {
                let history = self.ledger.history(&instance.module_id, Some(tenant))?;
                Ok(memory_trend(&history))
            }
            None => Ok(self
                .ledger
                .tenant_histories(&instance.module_id)?
                .iter()
                .map(|(_, history)| memory_trend(history))
                .fold(None, |acc: Option<f64>, growth| {
                    Some(acc.map_or(growth, |a| a.max(growth)))
                })
                .unwrap_or(1.0)),
        }
    }
}

/// Memory trend over the metrics window of a single series
fn memory_trend(history: &[UsageSample]) -> f64 {
    let start = history.len().saturating_sub(METRICS_WINDOW);
    let memory: Vec<f64> = history[start..].iter().map(|s| s.memory_usage).collect();
    trend_ratio(&memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(i: i64, memory: f64) -> UsageSample {
        UsageSample {
            module_id: "m".to_string(),
            tenant_id: "t".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i),
            memory_usage: memory,
            cpu_usage: 30.0 + i as f64,
            storage_usage: 10.0,
            network_usage: 1.0,
            active_requests: 20,
            response_time: 200.0,
            error_count: 1,
        }
    }

    #[test]
    fn test_static_source() {
        let source = StaticMetricsSource::default();
        let readings = source.readings(&ModuleInstance::new("m", None)).unwrap();
        assert_eq!(readings.latency_ms, 150.0);
        assert_eq!(readings.uptime_percent, 99.995);
    }

    #[test]
    fn test_ledger_source_readings() {
        let ledger = Arc::new(UsageLedger::new());
        ledger.record_usage(sample(0, 100.0)).unwrap();
        ledger.record_usage(sample(1, 150.0)).unwrap();
        ledger.record_usage(sample(2, 200.0)).unwrap();

        let source = LedgerMetricsSource::new(ledger).with_uptime(99.9);
        let instance = ModuleInstance::new("m", Some("t".to_string()));
        let readings = source.readings(&instance).unwrap();

        assert_eq!(readings.latency_ms, 200.0);
        assert_eq!(readings.cpu_percent, 31.0);
        assert!((readings.error_rate - 0.05).abs() < 1e-9);
        assert_eq!(readings.uptime_percent, 99.9);
        assert!((readings.memory_growth - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_module_wide_memory_growth_per_tenant() {
        let ledger = Arc::new(UsageLedger::new());
        for i in 0..5 {
            let mut a = sample(i * 2, 100.0);
            a.tenant_id = "a".to_string();
            let mut b = sample(i * 2 + 1, 300.0);
            b.tenant_id = "b".to_string();
            ledger.record_usage(a).unwrap();
            ledger.record_usage(b).unwrap();
        }
        let source = LedgerMetricsSource::new(ledger.clone());
        let module = ModuleInstance::new("m", None);
        assert_eq!(source.sample_memory_growth(&module).unwrap(), 1.0);

        // One tenant leaking is reported for the module
        let mut leak = sample(20, 250.0);
        leak.tenant_id = "a".to_string();
        ledger.record_usage(leak).unwrap();
        assert!((source.sample_memory_growth(&module).unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_error_rate_matches_performance_metrics() {
        let ledger = Arc::new(UsageLedger::new());
        for i in 0..3 {
            let mut s = sample(i, 100.0);
            s.active_requests = 0;
            ledger.record_usage(s).unwrap();
        }
        let source = LedgerMetricsSource::new(ledger.clone());
        let instance = ModuleInstance::new("m", Some("t".to_string()));
        let from_source = source.sample_error_rate(&instance).unwrap();
        let from_metrics = ledger.performance_metrics("m").unwrap().error_rate;
        assert_eq!(from_source, 1.0);
        assert_eq!(from_source, from_metrics);
    }

    #[test]
    fn test_ledger_source_without_history() {
        let source = LedgerMetricsSource::new(Arc::new(UsageLedger::new()));
        let readings = source
            .readings(&ModuleInstance::new("unknown", None))
            .unwrap();
        assert_eq!(readings.latency_ms, 0.0);
        assert_eq!(readings.error_rate, 0.0);
        assert_eq!(readings.memory_growth, 1.0);
    }

    #[test]
    fn test_ledger_source_rejects_blank_module() {
        let source = LedgerMetricsSource::new(Arc::new(UsageLedger::new()));
        assert!(source.readings(&ModuleInstance::new("", None)).is_err());
    }
}
