//! Engine configuration

use crate::ledger::DEFAULT_HISTORY_CAPACITY;
use crate::models::ResourceLimits;
use crate::monitor::HealthThresholds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a `ModuleEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name attached to structured log records
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Limits for modules without their own
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Samples kept per (module, tenant) pair
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Health monitoring interval in milliseconds
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    #[serde(default)]
    pub health_thresholds: HealthThresholds,
}

fn default_service_name() -> String {
    "module-engine".to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_monitor_interval_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            default_limits: ResourceLimits::default(),
            history_capacity: default_history_capacity(),
            monitor_interval_ms: default_monitor_interval_ms(),
            health_thresholds: HealthThresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}
