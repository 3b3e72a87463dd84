//! Recovery action execution
//!
//! The engine only decides which recovery actions are needed; carrying
//! them out is delegated to a `RecoveryExecutor` supplied by the runtime.

use crate::models::{ModuleInstance, RecoveryAction};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Capability interface for carrying out recovery actions
#[async_trait]
pub trait RecoveryExecutor: Send + Sync {
    /// Execute a single action against an instance
    async fn execute(&self, instance: &ModuleInstance, action: &RecoveryAction) -> Result<()>;
}

/// Executor that only records the action in the log
#[derive(Debug, Clone, Default)]
pub struct LoggingRecoveryExecutor;

#[async_trait]
impl RecoveryExecutor for LoggingRecoveryExecutor {
    async fn execute(&self, instance: &ModuleInstance, action: &RecoveryAction) -> Result<()> {
        info!(
            instance = %instance,
            action = %action.action_type,
            description = %action.description,
            estimated_minutes = action.estimated_duration,
            "Recovery action requested"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RecoveryType};

    #[test]
    fn test_logging_executor_succeeds() {
        let executor = LoggingRecoveryExecutor;
        let action = RecoveryAction {
            action_type: RecoveryType::Restart,
            description: "restart".to_string(),
            priority: Priority::Medium,
            automated: true,
            estimated_duration: 3,
        };
        let instance = ModuleInstance::new("m", None);
        tokio_test::assert_ok!(tokio_test::block_on(executor.execute(&instance, &action)));
    }
}
