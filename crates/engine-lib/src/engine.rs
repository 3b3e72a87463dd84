//! Engine facade
//!
//! `ModuleEngine` wires the usage ledger, scaling engine, health monitor and
//! tenant optimizer together behind one explicitly constructed service
//! object. Hosts build it once with `EngineBuilder` and share it behind an
//! `Arc`.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::UsageLedger;
use crate::models::{
    HealthStatus, ModuleInstance, ModulePreloadStrategy, OptimizationRecommendations,
    OptimizationResult, PerformanceMetrics, ResourceLimits, ScalingDecision,
    TenantModuleMapping, UsagePattern, UsageSample,
};
use crate::monitor::{
    HealthEvaluator, HealthMonitor, InstanceRegistry, LedgerMetricsSource,
    LoggingRecoveryExecutor, MetricsSource, RecoveryExecutor, TickSummary,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::optimizer::{InMemorySubscriptions, SubscriptionSource, TenantModuleOptimizer};
use crate::scaling::ScalingEngine;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a `ModuleEngine`
///
/// Collaborators left unset fall back to the in-process defaults: health
/// readings derived from the usage ledger, recovery actions that are only
/// logged, and in-memory subscriptions.
pub struct EngineBuilder {
    config: EngineConfig,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    recovery_executor: Option<Arc<dyn RecoveryExecutor>>,
    subscriptions: Option<Arc<dyn SubscriptionSource>>,
    ledger_uptime: f64,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            metrics_source: None,
            recovery_executor: None,
            subscriptions: None,
            ledger_uptime: 100.0,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the telemetry source polled by the health monitor
    pub fn metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.metrics_source = Some(source);
        self
    }

    /// Uptime reported by the default ledger-backed metrics source
    pub fn ledger_uptime(mut self, uptime_percent: f64) -> Self {
        self.ledger_uptime = uptime_percent;
        self
    }

    /// Set the executor that carries out automated recovery
    pub fn recovery_executor(mut self, executor: Arc<dyn RecoveryExecutor>) -> Self {
        self.recovery_executor = Some(executor);
        self
    }

    pub fn subscriptions(mut self, subscriptions: Arc<dyn SubscriptionSource>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    pub fn build(self) -> ModuleEngine {
        let config = self.config;
        let logger = StructuredLogger::new(config.service_name.clone());
        let ledger = Arc::new(UsageLedger::with_settings(
            config.default_limits,
            config.history_capacity,
        ));

        let uptime = self.ledger_uptime;
        let source = self.metrics_source.unwrap_or_else(|| {
            Arc::new(LedgerMetricsSource::new(ledger.clone()).with_uptime(uptime))
        });
        let executor = self
            .recovery_executor
            .unwrap_or_else(|| Arc::new(LoggingRecoveryExecutor));
        let subscriptions = self
            .subscriptions
            .unwrap_or_else(|| Arc::new(InMemorySubscriptions::new()));

        let registry = Arc::new(InstanceRegistry::new());
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            source,
            executor,
            HealthEvaluator::new(config.health_thresholds.clone()),
            logger.clone(),
        ));

        ModuleEngine {
            scaling: ScalingEngine::new(ledger.clone()),
            optimizer: TenantModuleOptimizer::new(subscriptions, logger.clone()),
            ledger,
            registry,
            monitor,
            metrics: EngineMetrics::new(),
            logger,
            config,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Module resource and health orchestration engine
pub struct ModuleEngine {
    config: EngineConfig,
    ledger: Arc<UsageLedger>,
    scaling: ScalingEngine,
    registry: Arc<InstanceRegistry>,
    monitor: Arc<HealthMonitor>,
    optimizer: TenantModuleOptimizer,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl ModuleEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    // Usage ledger

    pub fn record_resource_usage(&self, sample: UsageSample) -> Result<()> {
        self.ledger.record_usage(sample)?;
        self.metrics.inc_samples_recorded();
        Ok(())
    }

    /// Most recent samples for a pair, or for every tenant of the module
    pub fn get_current_resource_usage(
        &self,
        module_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<UsageSample>> {
        self.ledger.get_usage(module_id, tenant_id)
    }

    pub fn is_module_over_limit(&self, module_id: &str, tenant_id: &str) -> Result<bool> {
        self.ledger.is_over_limit(module_id, tenant_id)
    }

    pub fn set_module_limits(&self, module_id: &str, limits: ResourceLimits) -> Result<()> {
        self.ledger.set_module_limits(module_id, limits)
    }

    pub fn module_limits(&self, module_id: &str) -> ResourceLimits {
        self.ledger.limits_for(module_id)
    }

    pub fn performance_metrics(&self, module_id: &str) -> Option<PerformanceMetrics> {
        self.ledger.performance_metrics(module_id)
    }

    // Scaling

    pub fn analyze_usage_pattern(
        &self,
        module_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<UsagePattern> {
        self.scaling.analyze_pattern(module_id, tenant_id)
    }

    pub fn get_scaling_decision(
        &self,
        module_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<ScalingDecision> {
        let decision = self.scaling.decide(module_id, tenant_id)?;
        self.metrics.inc_scaling_decision(&decision.action.to_string());
        self.logger.log_scaling_decision(tenant_id, &decision);
        Ok(decision)
    }

    pub fn predict_scaling(&self, module_id: &str) -> Result<ScalingDecision> {
        let decision = self.scaling.predict(module_id)?;
        self.metrics.inc_scaling_decision(&decision.action.to_string());
        self.logger.log_scaling_decision(None, &decision);
        Ok(decision)
    }

    // Health

    /// Add an instance to the set checked on every monitoring tick
    pub fn register_instance(&self, module_id: &str, tenant_id: Option<&str>) -> Result<()> {
        self.registry.register(module_id, tenant_id)
    }

    /// Remove an instance and its cached health
    pub fn unregister_instance(&self, module_id: &str, tenant_id: Option<&str>) -> bool {
        let removed = self.registry.unregister(module_id, tenant_id);
        self.monitor
            .forget(&ModuleInstance::new(module_id, tenant_id.map(str::to_string)));
        removed
    }

    pub fn registered_instances(&self) -> Vec<ModuleInstance> {
        self.registry.list()
    }

    pub fn get_module_health(
        &self,
        module_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<HealthStatus> {
        self.monitor.get_module_health(module_id, tenant_id)
    }

    pub fn get_all_module_health(&self) -> Vec<HealthStatus> {
        self.monitor.get_all_module_health()
    }

    /// Run one monitoring pass immediately
    pub async fn run_health_checks(&self) -> TickSummary {
        self.monitor.run_tick().await
    }

    /// Start the monitoring loop; false if it is already running
    pub async fn start_monitoring(&self, interval: Duration) -> bool {
        self.monitor.start(interval).await
    }

    /// Start monitoring at the configured interval
    pub async fn start_default_monitoring(&self) -> bool {
        self.monitor.start(self.config.monitor_interval()).await
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.monitor.stop().await
    }

    pub async fn is_monitoring(&self) -> bool {
        self.monitor.is_running().await
    }

    // Tenant optimization

    pub fn record_module_usage(&self, tenant_id: &str, module_id: &str) -> Result<()> {
        self.optimizer.record_module_usage(tenant_id, module_id)
    }

    pub fn optimize_tenant_modules(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.optimizer.optimize(tenant_id)
    }

    pub fn get_optimization_recommendations(
        &self,
        tenant_id: &str,
    ) -> Result<OptimizationRecommendations> {
        self.optimizer.recommendations(tenant_id)
    }

    pub fn implement_lazy_loading(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.optimizer.implement_lazy_loading(tenant_id)
    }

    pub fn implement_preloading_strategies(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.optimizer.implement_preloading_strategies(tenant_id)
    }

    pub fn set_preload_strategy(&self, strategy: ModulePreloadStrategy) -> Result<()> {
        self.optimizer.set_strategy(strategy)
    }

    pub fn tenant_mapping(&self, tenant_id: &str) -> Option<TenantModuleMapping> {
        self.optimizer.mapping(tenant_id)
    }
}
