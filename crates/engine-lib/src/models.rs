//! Core data models for the orchestration engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-module resource ceilings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Memory ceiling in MB
    pub memory: f64,
    /// CPU ceiling in cores
    pub cpu: f64,
    /// Storage ceiling in MB
    pub storage: f64,
    /// Network bandwidth ceiling in Mbit/s
    pub network_bandwidth: f64,
    pub concurrent_requests: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory: 512.0,
            cpu: 1.0,
            storage: 1024.0,
            network_bandwidth: 10.0,
            concurrent_requests: 100,
        }
    }
}

/// A single resource-usage observation for a module instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub module_id: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    /// Memory in MB
    pub memory_usage: f64,
    /// CPU as a percentage of one core (100.0 == 1 core)
    pub cpu_usage: f64,
    /// Storage in MB
    pub storage_usage: f64,
    pub network_usage: f64,
    pub active_requests: u32,
    /// Response time in milliseconds
    pub response_time: f64,
    /// Failed requests observed alongside this sample
    #[serde(default)]
    pub error_count: u32,
}

/// Derived performance view of a module, refreshed on every sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub module_id: String,
    pub average_response_time: f64,
    /// Samples per second over the observed window
    pub throughput: f64,
    pub error_rate: f64,
    /// 0.0-1.0, mean of memory and cpu utilization against limits
    pub resource_efficiency: f64,
    /// Recent vs older CPU ratio, clamped to 0.5-2.0
    pub scaling_score: f64,
    pub last_updated: DateTime<Utc>,
}

/// Usage pattern classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Spike,
    Steady,
    Declining,
    Cyclical,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::Spike => write!(f, "spike"),
            PatternType::Steady => write!(f, "steady"),
            PatternType::Declining => write!(f, "declining"),
            PatternType::Cyclical => write!(f, "cyclical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePattern {
    pub pattern_type: PatternType,
    pub confidence: f64,
    /// Number of samples the classification was based on
    pub duration: usize,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    Maintain,
}

impl std::fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalingAction::ScaleUp => write!(f, "scale_up"),
            ScalingAction::ScaleDown => write!(f, "scale_down"),
            ScalingAction::Maintain => write!(f, "maintain"),
        }
    }
}

/// Signed deltas in -1.0..=1.0 expected from applying a decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub performance_improvement: f64,
    pub cost_change: f64,
    pub resource_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub module_id: String,
    pub action: ScalingAction,
    /// Multiplicative resource adjustment (1.3 == +30%)
    pub factor: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub estimated_impact: EstimatedImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Points contributed to the composite health score
    pub fn points(&self) -> f64 {
        match self {
            CheckStatus::Pass => 100.0,
            CheckStatus::Warn => 60.0,
            CheckStatus::Fail => 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Warning,
    Critical,
    Failed,
}

impl HealthState {
    /// States in which automated recovery runs
    pub fn needs_recovery(&self) -> bool {
        matches!(self, HealthState::Critical | HealthState::Failed)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Warning => write!(f, "warning"),
            HealthState::Critical => write!(f, "critical"),
            HealthState::Failed => write!(f, "failed"),
        }
    }
}

/// Current health snapshot for a module instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub module_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub status: HealthState,
    pub score: f64,
    pub checks: Vec<HealthCheck>,
    pub last_checked: DateTime<Utc>,
    pub recovery_actions: Vec<RecoveryAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryType {
    Restart,
    Scale,
    Migrate,
    ClearCache,
    NotifyAdmin,
}

impl std::fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryType::Restart => write!(f, "restart"),
            RecoveryType::Scale => write!(f, "scale"),
            RecoveryType::Migrate => write!(f, "migrate"),
            RecoveryType::ClearCache => write!(f, "clear_cache"),
            RecoveryType::NotifyAdmin => write!(f, "notify_admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub action_type: RecoveryType,
    pub description: String,
    pub priority: Priority,
    pub automated: bool,
    /// Expected duration in minutes
    pub estimated_duration: u32,
}

/// A running module instance the monitor should check
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleInstance {
    pub module_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ModuleInstance {
    pub fn new(module_id: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self {
            module_id: module_id.into(),
            tenant_id,
        }
    }
}

impl std::fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tenant_id {
            Some(tenant) => write!(f, "{}@{}", self.module_id, tenant),
            None => write!(f, "{}", self.module_id),
        }
    }
}

/// Load state of a tenant's subscribed modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantModuleMapping {
    pub tenant_id: String,
    pub subscribed_modules: Vec<String>,
    pub active_modules: Vec<String>,
    pub preloaded_modules: Vec<String>,
    pub lazy_modules: Vec<String>,
    pub last_optimized: DateTime<Utc>,
}

impl TenantModuleMapping {
    pub fn empty(tenant_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            subscribed_modules: Vec::new(),
            active_modules: Vec::new(),
            preloaded_modules: Vec::new(),
            lazy_modules: Vec::new(),
            last_optimized: now,
        }
    }

    /// Modules currently kept in memory
    pub fn is_loaded(&self, module_id: &str) -> bool {
        self.active_modules.iter().any(|m| m == module_id)
            || self.preloaded_modules.iter().any(|m| m == module_id)
    }

    /// Check that the three load-state lists are disjoint subsets of the subscriptions
    pub fn is_consistent(&self) -> bool {
        let lists = [&self.active_modules, &self.preloaded_modules, &self.lazy_modules];
        let mut seen = std::collections::HashSet::new();
        for list in lists {
            for module in list {
                if !self.subscribed_modules.contains(module) || !seen.insert(module.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadStrategy {
    Eager,
    Lazy,
    OnDemand,
    Predictive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreloadConditions {
    /// Hours of day (0-23) during which proactive loading applies
    #[serde(default)]
    pub time_of_day: Vec<u32>,
    #[serde(default)]
    pub user_activity: Vec<String>,
    #[serde(default)]
    pub resource_threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePreloadStrategy {
    pub module_id: String,
    pub strategy: PreloadStrategy,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<PreloadConditions>,
}

impl ModulePreloadStrategy {
    pub fn new(module_id: impl Into<String>, strategy: PreloadStrategy, priority: u32) -> Self {
        Self {
            module_id: module_id.into(),
            strategy,
            priority,
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: PreloadConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }
}

/// Outcome of a tenant optimization cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub tenant_id: String,
    pub modules_preloaded: Vec<String>,
    pub modules_unloaded: Vec<String>,
    pub performance_gain: f64,
    pub resource_savings: f64,
    pub mapping: TenantModuleMapping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationImpact {
    pub performance_gain: f64,
    pub resource_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendations {
    pub tenant_id: String,
    pub recommendations: Vec<String>,
    pub estimated_impact: OptimizationImpact,
}
