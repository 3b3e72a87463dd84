//! Observability infrastructure for the orchestration engine
//!
//! Provides:
//! - Prometheus metrics (samples, decisions, health evaluations, recovery, optimizations)
//! - Structured JSON logging with tracing

use crate::models::{
    HealthStatus, ModuleInstance, OptimizationResult, RecoveryAction, ScalingDecision,
};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for monitor tick latency (in seconds)
const TICK_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    samples_recorded: IntCounter,
    scaling_decisions: IntCounterVec,
    health_evaluations: IntCounterVec,
    recovery_actions: IntCounterVec,
    optimizations: IntCounter,
    monitor_tick_seconds: Histogram,
    monitored_instances: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            samples_recorded: register_int_counter!(
                "module_engine_usage_samples_total",
                "Total number of usage samples recorded"
            )
            .expect("Failed to register usage_samples_total"),

            scaling_decisions: register_int_counter_vec!(
                "module_engine_scaling_decisions_total",
                "Scaling decisions produced, by action",
                &["action"]
            )
            .expect("Failed to register scaling_decisions_total"),

            health_evaluations: register_int_counter_vec!(
                "module_engine_health_evaluations_total",
                "Health evaluations performed, by resulting status",
                &["status"]
            )
            .expect("Failed to register health_evaluations_total"),

            recovery_actions: register_int_counter_vec!(
                "module_engine_recovery_actions_total",
                "Automated recovery actions executed, by type and outcome",
                &["action", "outcome"]
            )
            .expect("Failed to register recovery_actions_total"),

            optimizations: register_int_counter!(
                "module_engine_tenant_optimizations_total",
                "Total number of tenant optimization cycles committed"
            )
            .expect("Failed to register tenant_optimizations_total"),

            monitor_tick_seconds: register_histogram!(
                "module_engine_monitor_tick_seconds",
                "Time spent in one health monitoring tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register monitor_tick_seconds"),

            monitored_instances: register_int_gauge!(
                "module_engine_monitored_instances",
                "Number of module instances checked in the last tick"
            )
            .expect("Failed to register monitored_instances"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn inc_samples_recorded(&self) {
        self.inner().samples_recorded.inc();
    }

    pub fn inc_scaling_decision(&self, action: &str) {
        self.inner()
            .scaling_decisions
            .with_label_values(&[action])
            .inc();
    }

    pub fn inc_health_evaluation(&self, status: &str) {
        self.inner()
            .health_evaluations
            .with_label_values(&[status])
            .inc();
    }

    pub fn inc_recovery_action(&self, action: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .recovery_actions
            .with_label_values(&[action, outcome])
            .inc();
    }

    pub fn inc_optimizations(&self) {
        self.inner().optimizations.inc();
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().monitor_tick_seconds.observe(duration_secs);
    }

    pub fn set_monitored_instances(&self, count: i64) {
        self.inner().monitored_instances.set(count);
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for decisions, health
/// verdicts, recovery actions and tenant optimizations.
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Log a scaling decision
    pub fn log_scaling_decision(&self, tenant_id: Option<&str>, decision: &ScalingDecision) {
        info!(
            event = "scaling_decision",
            service = %self.service_name,
            module_id = %decision.module_id,
            tenant_id = ?tenant_id,
            action = %decision.action,
            factor = decision.factor,
            confidence = decision.confidence,
            reasoning = %decision.reasoning,
            "Scaling decision produced"
        );
    }

    /// Log a health evaluation, escalating to warn for critical states
    pub fn log_health_evaluated(&self, health: &HealthStatus) {
        if health.status.needs_recovery() {
            warn!(
                event = "health_evaluated",
                service = %self.service_name,
                module_id = %health.module_id,
                tenant_id = ?health.tenant_id,
                status = %health.status,
                score = health.score,
                recovery_actions = health.recovery_actions.len(),
                "Module health degraded"
            );
        } else {
            info!(
                event = "health_evaluated",
                service = %self.service_name,
                module_id = %health.module_id,
                tenant_id = ?health.tenant_id,
                status = %health.status,
                score = health.score,
                "Module health evaluated"
            );
        }
    }

    /// Log the outcome of an automated recovery action
    pub fn log_recovery_action(
        &self,
        instance: &ModuleInstance,
        action: &RecoveryAction,
        error: Option<&str>,
    ) {
        match error {
            None => {
                info!(
                    event = "recovery_action",
                    service = %self.service_name,
                    instance = %instance,
                    action = %action.action_type,
                    priority = ?action.priority,
                    success = true,
                    "Recovery action executed"
                );
            }
            Some(error) => {
                warn!(
                    event = "recovery_action",
                    service = %self.service_name,
                    instance = %instance,
                    action = %action.action_type,
                    priority = ?action.priority,
                    success = false,
                    error = %error,
                    "Recovery action failed"
                );
            }
        }
    }

    /// Log a committed tenant optimization
    pub fn log_optimization(&self, result: &OptimizationResult) {
        info!(
            event = "tenant_optimized",
            service = %self.service_name,
            tenant_id = %result.tenant_id,
            active = result.mapping.active_modules.len(),
            preloaded = result.mapping.preloaded_modules.len(),
            lazy = result.mapping.lazy_modules.len(),
            modules_preloaded = ?result.modules_preloaded,
            modules_unloaded = ?result.modules_unloaded,
            performance_gain = result.performance_gain,
            resource_savings = result.resource_savings,
            "Tenant module mapping optimized"
        );
    }

    /// Log monitoring loop start/stop
    pub fn log_monitoring_state(&self, running: bool, interval_ms: u64) {
        info!(
            event = "monitoring_state",
            service = %self.service_name,
            running = running,
            interval_ms = interval_ms,
            "Health monitoring {}",
            if running { "started" } else { "stopped" }
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "engine_started",
            service = %self.service_name,
            version = %version,
            "Module engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Module engine shutting down"
        );
    }
}
