//! Tenant module load-state optimizer
//!
//! Classifies every module a tenant subscribes to as active, preloaded or
//! lazy from its recent invocations and configured preload strategy.
//! Mappings are replaced wholesale on each commit.

use super::invocations::InvocationLog;
use super::subscriptions::SubscriptionSource;
use crate::error::{validate_id, Result};
use crate::models::{
    ModulePreloadStrategy, OptimizationImpact, OptimizationRecommendations, OptimizationResult,
    PreloadConditions, PreloadStrategy, TenantModuleMapping,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use chrono::{DateTime, Duration, Timelike, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// A module used within this window is active
pub const ACTIVE_WINDOW_HOURS: i64 = 1;

/// Window for the frequent-use preload rule
pub const PRELOAD_WINDOW_HOURS: i64 = 24;

/// Uses within the preload window that earn a preload
pub const PRELOAD_MIN_USES: usize = 6;

/// Same-hour invocations a predictive strategy needs
pub const PREDICTIVE_MIN_HITS: usize = 2;

/// Hours either side of the current hour that count as "same hour"
pub const PREDICTIVE_HOUR_RADIUS: u32 = 1;

const GAIN_PER_PRELOAD: f64 = 0.2;
const SAVINGS_PER_UNLOAD: f64 = 0.15;

/// Proposed mapping plus its diff against the previous one
struct Plan {
    mapping: TenantModuleMapping,
    preloaded_added: Vec<String>,
    unloaded: Vec<String>,
}

impl Plan {
    fn impact(&self) -> OptimizationImpact {
        impact(self.preloaded_added.len(), self.unloaded.len())
    }
}

fn impact(preloaded: usize, unloaded: usize) -> OptimizationImpact {
    OptimizationImpact {
        performance_gain: GAIN_PER_PRELOAD * preloaded as f64,
        resource_savings: SAVINGS_PER_UNLOAD * unloaded as f64,
    }
}

pub struct TenantModuleOptimizer {
    subscriptions: Arc<dyn SubscriptionSource>,
    invocations: InvocationLog,
    mappings: DashMap<String, TenantModuleMapping>,
    strategies: DashMap<String, ModulePreloadStrategy>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl TenantModuleOptimizer {
    pub fn new(subscriptions: Arc<dyn SubscriptionSource>, logger: StructuredLogger) -> Self {
        Self {
            subscriptions,
            invocations: InvocationLog::new(),
            mappings: DashMap::new(),
            strategies: DashMap::new(),
            metrics: EngineMetrics::new(),
            logger,
        }
    }

    /// Record one invocation of a module by a tenant
    pub fn record_module_usage(&self, tenant_id: &str, module_id: &str) -> Result<()> {
        self.record_module_usage_at(tenant_id, module_id, Utc::now())
    }

    pub fn record_module_usage_at(
        &self,
        tenant_id: &str,
        module_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        validate_id("tenant_id", tenant_id)?;
        validate_id("module_id", module_id)?;
        self.invocations.record(tenant_id, module_id, at);
        Ok(())
    }

    pub fn set_strategy(&self, strategy: ModulePreloadStrategy) -> Result<()> {
        validate_id("module_id", &strategy.module_id)?;
        debug!(
            module_id = %strategy.module_id,
            strategy = ?strategy.strategy,
            priority = strategy.priority,
            "Preload strategy set"
        );
        self.strategies.insert(strategy.module_id.clone(), strategy);
        Ok(())
    }

    pub fn strategy(&self, module_id: &str) -> Option<ModulePreloadStrategy> {
        self.strategies.get(module_id).map(|s| s.clone())
    }

    /// Last committed mapping for a tenant
    pub fn mapping(&self, tenant_id: &str) -> Option<TenantModuleMapping> {
        self.mappings.get(tenant_id).map(|m| m.clone())
    }

    pub fn invocations(&self) -> &InvocationLog {
        &self.invocations
    }

    /// Reclassify every subscribed module and commit the new mapping
    pub fn optimize(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.optimize_at(tenant_id, Utc::now())
    }

    pub fn optimize_at(&self, tenant_id: &str, now: DateTime<Utc>) -> Result<OptimizationResult> {
        validate_id("tenant_id", tenant_id)?;

        let mut entry = self
            .mappings
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantModuleMapping::empty(tenant_id, now));
        let plan = self.plan(tenant_id, &entry, now);
        *entry = plan.mapping.clone();
        drop(entry);

        let impact = plan.impact();
        let result = OptimizationResult {
            tenant_id: tenant_id.to_string(),
            modules_preloaded: plan.preloaded_added,
            modules_unloaded: plan.unloaded,
            performance_gain: impact.performance_gain,
            resource_savings: impact.resource_savings,
            mapping: plan.mapping,
        };
        self.metrics.inc_optimizations();
        self.logger.log_optimization(&result);
        Ok(result)
    }

    /// Move active modules unused for over an hour to lazy loading
    pub fn implement_lazy_loading(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.implement_lazy_loading_at(tenant_id, Utc::now())
    }

    pub fn implement_lazy_loading_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OptimizationResult> {
        validate_id("tenant_id", tenant_id)?;
        let active_cutoff = now - Duration::hours(ACTIVE_WINDOW_HOURS);

        let mut entry = self
            .mappings
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantModuleMapping::empty(tenant_id, now));
        let mut next = self.reconcile(tenant_id, &entry, now);

        let (idle, active): (Vec<String>, Vec<String>) =
            next.active_modules.drain(..).partition(|module| {
                self.invocations
                    .last_used(tenant_id, module)
                    .map_or(true, |last| last < active_cutoff)
            });
        next.active_modules = active;
        next.lazy_modules.extend(idle.iter().cloned());
        *entry = next.clone();
        drop(entry);

        let result = self.commit_result(tenant_id, Vec::new(), idle, next);
        self.logger.log_optimization(&result);
        Ok(result)
    }

    /// Apply each subscribed module's preload strategy
    pub fn implement_preloading_strategies(&self, tenant_id: &str) -> Result<OptimizationResult> {
        self.implement_preloading_strategies_at(tenant_id, Utc::now())
    }

    pub fn implement_preloading_strategies_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OptimizationResult> {
        validate_id("tenant_id", tenant_id)?;

        let mut entry = self
            .mappings
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantModuleMapping::empty(tenant_id, now));
        let mut next = self.reconcile(tenant_id, &entry, now);

        let mut preloaded = Vec::new();
        let mut unloaded = Vec::new();
        for module in next.subscribed_modules.clone() {
            if next.active_modules.contains(&module) {
                continue;
            }
            let Some(strategy) = self.strategy(&module) else {
                continue;
            };
            match self.strategy_verdict(tenant_id, &strategy, now) {
                Some(true) if !next.preloaded_modules.contains(&module) => {
                    next.lazy_modules.retain(|m| m != &module);
                    next.preloaded_modules.push(module.clone());
                    preloaded.push(module);
                }
                Some(false) if next.preloaded_modules.contains(&module) => {
                    next.preloaded_modules.retain(|m| m != &module);
                    next.lazy_modules.push(module.clone());
                    unloaded.push(module);
                }
                _ => {}
            }
        }
        *entry = next.clone();
        drop(entry);

        let result = self.commit_result(tenant_id, preloaded, unloaded, next);
        self.logger.log_optimization(&result);
        Ok(result)
    }

    /// Dry run of `optimize`: what would change and why, without committing
    pub fn recommendations(&self, tenant_id: &str) -> Result<OptimizationRecommendations> {
        self.recommendations_at(tenant_id, Utc::now())
    }

    pub fn recommendations_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OptimizationRecommendations> {
        validate_id("tenant_id", tenant_id)?;

        let previous = self
            .mapping(tenant_id)
            .unwrap_or_else(|| TenantModuleMapping::empty(tenant_id, now));
        let plan = self.plan(tenant_id, &previous, now);
        let day_cutoff = now - Duration::hours(PRELOAD_WINDOW_HOURS);

        let mut recommendations = Vec::new();
        for module in &plan.preloaded_added {
            if self.eager_applies(module, now) {
                recommendations.push(format!("Preload {}: eager preload strategy", module));
            } else {
                let uses = self.invocations.count_since(tenant_id, module, day_cutoff);
                recommendations.push(format!(
                    "Preload {}: {} invocations in the last {} hours",
                    module, uses, PRELOAD_WINDOW_HOURS
                ));
            }
        }
        for module in &plan.unloaded {
            if !plan.mapping.subscribed_modules.contains(module) {
                recommendations.push(format!("Unload {}: no longer subscribed", module));
            } else if !previous.preloaded_modules.contains(module) {
                recommendations.push(format!(
                    "Switch {} to lazy loading: not used in the last hour",
                    module
                ));
            } else if self.strategy(module).is_some_and(|s| s.strategy == PreloadStrategy::Eager) {
                recommendations.push(format!(
                    "Switch {} to lazy loading: eager preload schedule no longer applies",
                    module
                ));
            } else {
                let uses = self.invocations.count_since(tenant_id, module, day_cutoff);
                recommendations.push(format!(
                    "Switch {} to lazy loading: {} invocations in the last {} hours, fewer than {}",
                    module, uses, PRELOAD_WINDOW_HOURS, PRELOAD_MIN_USES
                ));
            }
        }
        for module in &plan.mapping.subscribed_modules {
            if let Some(conditions) = self.strategy(module).and_then(|s| s.conditions) {
                recommendations.extend(condition_notes(module, &conditions));
            }
        }
        if recommendations.is_empty() {
            recommendations.push(format!(
                "Module loading for tenant {} is already optimal",
                tenant_id
            ));
        }

        Ok(OptimizationRecommendations {
            tenant_id: tenant_id.to_string(),
            recommendations,
            estimated_impact: plan.impact(),
        })
    }

    fn plan(&self, tenant_id: &str, previous: &TenantModuleMapping, now: DateTime<Utc>) -> Plan {
        let active_cutoff = now - Duration::hours(ACTIVE_WINDOW_HOURS);
        let day_cutoff = now - Duration::hours(PRELOAD_WINDOW_HOURS);

        let mut mapping = TenantModuleMapping::empty(tenant_id, now);
        mapping.subscribed_modules = self.subscribed(tenant_id);

        for module in &mapping.subscribed_modules {
            let recently_used = self
                .invocations
                .last_used(tenant_id, module)
                .is_some_and(|last| last >= active_cutoff);
            let daily_uses = self.invocations.count_since(tenant_id, module, day_cutoff);

            if recently_used {
                mapping.active_modules.push(module.clone());
            } else if daily_uses >= PRELOAD_MIN_USES || self.eager_applies(module, now) {
                mapping.preloaded_modules.push(module.clone());
            } else {
                mapping.lazy_modules.push(module.clone());
            }
        }

        let preloaded_added = mapping
            .preloaded_modules
            .iter()
            .filter(|m| !previous.preloaded_modules.contains(m))
            .cloned()
            .collect();
        let unloaded = previous
            .active_modules
            .iter()
            .chain(previous.preloaded_modules.iter())
            .filter(|m| !mapping.is_loaded(m))
            .cloned()
            .collect();

        Plan {
            mapping,
            preloaded_added,
            unloaded,
        }
    }

    /// Previous mapping restricted to current subscriptions; newly
    /// subscribed modules start lazy
    fn reconcile(
        &self,
        tenant_id: &str,
        previous: &TenantModuleMapping,
        now: DateTime<Utc>,
    ) -> TenantModuleMapping {
        let subscribed = self.subscribed(tenant_id);
        let keep = |list: &[String]| -> Vec<String> {
            list.iter()
                .filter(|m| subscribed.contains(m))
                .cloned()
                .collect()
        };

        let mut next = TenantModuleMapping::empty(tenant_id, now);
        next.active_modules = keep(&previous.active_modules);
        next.preloaded_modules = keep(&previous.preloaded_modules);
        next.lazy_modules = keep(&previous.lazy_modules);
        for module in &subscribed {
            if !next.is_loaded(module) && !next.lazy_modules.contains(module) {
                next.lazy_modules.push(module.clone());
            }
        }
        next.subscribed_modules = subscribed;
        next
    }

    fn subscribed(&self, tenant_id: &str) -> Vec<String> {
        let mut modules: Vec<String> = Vec::new();
        for module in self.subscriptions.subscriptions(tenant_id) {
            if !module.trim().is_empty() && !modules.contains(&module) {
                modules.push(module);
            }
        }
        modules
    }

    fn eager_applies(&self, module_id: &str, now: DateTime<Utc>) -> bool {
        self.strategy(module_id).is_some_and(|s| {
            s.strategy == PreloadStrategy::Eager && within_schedule(s.conditions.as_ref(), now)
        })
    }

    /// `Some(true)` to preload, `Some(false)` to keep lazy, `None` to leave as is
    fn strategy_verdict(
        &self,
        tenant_id: &str,
        strategy: &ModulePreloadStrategy,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        let scheduled = within_schedule(strategy.conditions.as_ref(), now);
        match strategy.strategy {
            PreloadStrategy::Eager => scheduled.then_some(true),
            PreloadStrategy::Lazy | PreloadStrategy::OnDemand => Some(false),
            PreloadStrategy::Predictive => {
                let hits = self.invocations.count_near_hour(
                    tenant_id,
                    &strategy.module_id,
                    now.hour(),
                    PREDICTIVE_HOUR_RADIUS,
                );
                (scheduled && hits >= PREDICTIVE_MIN_HITS).then_some(true)
            }
        }
    }

    fn commit_result(
        &self,
        tenant_id: &str,
        preloaded: Vec<String>,
        unloaded: Vec<String>,
        mapping: TenantModuleMapping,
    ) -> OptimizationResult {
        let impact = impact(preloaded.len(), unloaded.len());
        OptimizationResult {
            tenant_id: tenant_id.to_string(),
            modules_preloaded: preloaded,
            modules_unloaded: unloaded,
            performance_gain: impact.performance_gain,
            resource_savings: impact.resource_savings,
            mapping,
        }
    }
}

/// Empty hour list means any hour
fn within_schedule(conditions: Option<&PreloadConditions>, now: DateTime<Utc>) -> bool {
    match conditions {
        Some(c) if !c.time_of_day.is_empty() => c.time_of_day.contains(&now.hour()),
        _ => true,
    }
}

fn condition_notes(module_id: &str, conditions: &PreloadConditions) -> Vec<String> {
    let mut notes = Vec::new();
    if !conditions.user_activity.is_empty() {
        notes.push(format!(
            "Consider preloading {} on user activity: {}",
            module_id,
            conditions.user_activity.join(", ")
        ));
    }
    if let Some(threshold) = conditions.resource_threshold {
        notes.push(format!(
            "Preload {} only while resource usage stays below {:.0}%",
            module_id, threshold
        ));
    }
    notes
}
