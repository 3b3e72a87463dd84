//! Module health monitoring and automated recovery

pub mod checks;
pub mod health_monitor;
pub mod recovery;
pub mod registry;
pub mod source;

pub use checks::{HealthEvaluator, HealthReadings, HealthThresholds};
pub use health_monitor::{HealthMonitor, TickSummary, DEFAULT_MONITOR_INTERVAL};
pub use recovery::{LoggingRecoveryExecutor, RecoveryExecutor};
pub use registry::InstanceRegistry;
pub use source::{LedgerMetricsSource, MetricsSource, StaticMetricsSource};
