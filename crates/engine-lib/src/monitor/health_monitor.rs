//! Background health monitoring loop
//!
//! Periodically evaluates every registered module instance, caches the
//! latest `HealthStatus`, and runs automated recovery for instances that
//! are critical or failed. One instance failing to report or recover never
//! stops the others from being checked.

use super::checks::HealthEvaluator;
use super::recovery::RecoveryExecutor;
use super::registry::InstanceRegistry;
use super::source::MetricsSource;
use crate::error::{validate_id, validate_tenant, EngineError, Result};
use crate::models::{HealthStatus, ModuleInstance};
use crate::observability::{EngineMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default interval between monitoring ticks
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest interval the loop will run at
const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Counters from one monitoring tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub instances_checked: usize,
    pub check_errors: usize,
    pub recoveries_attempted: usize,
    pub actions_executed: usize,
    pub actions_failed: usize,
}

/// Handle to the running loop
struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    interval: Duration,
}

/// Evaluates module health and drives automated recovery
pub struct HealthMonitor {
    evaluator: HealthEvaluator,
    source: Arc<dyn MetricsSource>,
    executor: Arc<dyn RecoveryExecutor>,
    registry: Arc<InstanceRegistry>,
    statuses: DashMap<ModuleInstance, HealthStatus>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    handle: Mutex<Option<MonitorHandle>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        source: Arc<dyn MetricsSource>,
        executor: Arc<dyn RecoveryExecutor>,
        evaluator: HealthEvaluator,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            evaluator,
            source,
            executor,
            registry,
            statuses: DashMap::new(),
            metrics: EngineMetrics::new(),
            logger,
            handle: Mutex::new(None),
        }
    }

    /// Evaluate an instance now, caching the result while it is registered
    pub fn check_instance(&self, instance: &ModuleInstance) -> Result<HealthStatus> {
        self.check_instance_at(instance, Utc::now())
    }

    pub fn check_instance_at(
        &self,
        instance: &ModuleInstance,
        now: DateTime<Utc>,
    ) -> Result<HealthStatus> {
        let health = self.evaluate_at(instance, now)?;
        self.cache_if_registered(instance, &health);
        Ok(health)
    }

    /// Evaluate an instance without touching the cache
    pub fn evaluate_at(&self, instance: &ModuleInstance, now: DateTime<Utc>) -> Result<HealthStatus> {
        let readings = self
            .source
            .readings(instance)
            .map_err(|e| EngineError::MetricsUnavailable {
                instance: instance.to_string(),
                reason: e.to_string(),
            })?;
        let evaluation = self.evaluator.evaluate(&readings);

        let health = HealthStatus {
            module_id: instance.module_id.clone(),
            tenant_id: instance.tenant_id.clone(),
            status: evaluation.status,
            score: evaluation.score,
            checks: evaluation.checks,
            last_checked: now,
            recovery_actions: evaluation.recovery_actions,
        };

        self.metrics.inc_health_evaluation(&health.status.to_string());
        self.logger.log_health_evaluated(&health);
        Ok(health)
    }

    /// Store a status only for registered instances
    ///
    /// The registry is consulted again after the insert so an unregister
    /// racing with an in-flight evaluation never leaves a stale entry.
    fn cache_if_registered(&self, instance: &ModuleInstance, health: &HealthStatus) -> bool {
        if !self.registry.contains(instance) {
            return false;
        }
        self.statuses.insert(instance.clone(), health.clone());
        if !self.registry.contains(instance) {
            self.statuses.remove(instance);
            return false;
        }
        true
    }

    /// Health for an instance
    ///
    /// Registered instances are served from the cache, evaluated on first
    /// request. Unregistered instances are evaluated fresh on every call and
    /// never cached.
    pub fn get_module_health(&self, module_id: &str, tenant_id: Option<&str>) -> Result<HealthStatus> {
        validate_id("module_id", module_id)?;
        validate_tenant(tenant_id)?;
        let instance = ModuleInstance::new(module_id, tenant_id.map(str::to_string));
        if !self.registry.contains(&instance) {
            return self.evaluate_at(&instance, Utc::now());
        }
        if let Some(cached) = self.statuses.get(&instance) {
            return Ok(cached.clone());
        }
        self.check_instance(&instance)
    }

    /// Every cached health status, ordered by instance
    pub fn get_all_module_health(&self) -> Vec<HealthStatus> {
        let mut entries: Vec<(ModuleInstance, HealthStatus)> = self
            .statuses
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, h)| h).collect()
    }

    /// Drop the cached status of an instance
    pub fn forget(&self, instance: &ModuleInstance) {
        self.statuses.remove(instance);
    }

    /// Check every registered instance once and recover where needed
    pub async fn run_tick(&self) -> TickSummary {
        let start = Instant::now();
        let instances = self.registry.list();
        let mut summary = TickSummary::default();

        for instance in &instances {
            match self.evaluate_at(instance, Utc::now()) {
                Ok(health) => {
                    summary.instances_checked += 1;
                    if !self.cache_if_registered(instance, &health) {
                        debug!(instance = %instance, "Instance unregistered during check");
                        continue;
                    }
                    if health.status.needs_recovery() {
                        summary.recoveries_attempted += 1;
                        let (ok, failed) = self.recover(instance, &health).await;
                        summary.actions_executed += ok;
                        summary.actions_failed += failed;
                    }
                }
                Err(e) => {
                    summary.check_errors += 1;
                    warn!(instance = %instance, error = %e, "Health check failed");
                }
            }
        }

        self.metrics.set_monitored_instances(instances.len() as i64);
        self.metrics.observe_tick_latency(start.elapsed().as_secs_f64());
        debug!(
            checked = summary.instances_checked,
            errors = summary.check_errors,
            recoveries = summary.recoveries_attempted,
            elapsed_ms = start.elapsed().as_millis(),
            "Monitoring tick complete"
        );
        summary
    }

    /// Execute the automated actions in order; failures do not stop the rest
    async fn recover(&self, instance: &ModuleInstance, health: &HealthStatus) -> (usize, usize) {
        let mut executed = 0;
        let mut failed = 0;

        for action in health.recovery_actions.iter().filter(|a| a.automated) {
            let action_name = action.action_type.to_string();
            match self.executor.execute(instance, action).await {
                Ok(()) => {
                    executed += 1;
                    self.metrics.inc_recovery_action(&action_name, true);
                    self.logger.log_recovery_action(instance, action, None);
                }
                Err(e) => {
                    failed += 1;
                    self.metrics.inc_recovery_action(&action_name, false);
                    self.logger
                        .log_recovery_action(instance, action, Some(&e.to_string()));
                }
            }
        }
        (executed, failed)
    }

    /// Start the monitoring loop; returns false if it was already running
    pub async fn start(self: &Arc<Self>, period: Duration) -> bool {
        let mut handle = self.handle.lock().await;
        if let Some(existing) = handle.as_ref() {
            if !existing.task.is_finished() {
                debug!(
                    interval_ms = existing.interval.as_millis() as u64,
                    "Monitoring already running"
                );
                return false;
            }
        }

        let period = period.max(MIN_MONITOR_INTERVAL);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(Arc::downgrade(self), period, shutdown_rx));

        *handle = Some(MonitorHandle {
            shutdown_tx,
            task,
            interval: period,
        });
        self.logger
            .log_monitoring_state(true, period.as_millis() as u64);
        true
    }

    /// Stop the loop, letting an in-flight tick finish; false if not running
    pub async fn stop(&self) -> bool {
        let Some(handle) = self.handle.lock().await.take() else {
            return false;
        };

        let _ = handle.shutdown_tx.send(true);
        if let Err(e) = handle.task.await {
            warn!(error = %e, "Monitoring task ended abnormally");
        }
        self.logger
            .log_monitoring_state(false, handle.interval.as_millis() as u64);
        true
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|h| !h.task.is_finished())
            .unwrap_or(false)
    }
}

async fn run_loop(
    monitor: Weak<HealthMonitor>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_ms = period.as_millis() as u64, "Starting health monitoring loop");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(monitor) = monitor.upgrade() else {
                    debug!("Health monitor dropped, ending loop");
                    break;
                };
                monitor.run_tick().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutting down health monitoring loop");
                    break;
                }
            }
        }
    }
}
