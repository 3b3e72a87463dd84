//! Registry of active module instances
//!
//! Maintained by the runtime executor; the health monitor checks every
//! registered instance on each tick.

use crate::error::{validate_id, validate_tenant, Result};
use crate::models::ModuleInstance;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Active module instances keyed by (module, tenant)
#[derive(Default)]
pub struct InstanceRegistry {
    /// Instance -> registration time
    instances: DashMap<ModuleInstance, DateTime<Utc>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Register an instance; re-registering keeps the original timestamp
    pub fn register(&self, module_id: &str, tenant_id: Option<&str>) -> Result<()> {
        validate_id("module_id", module_id)?;
        validate_tenant(tenant_id)?;
        let instance = ModuleInstance::new(module_id, tenant_id.map(str::to_string));
        debug!(instance = %instance, "Registering module instance");
        self.instances.entry(instance).or_insert_with(Utc::now);
        Ok(())
    }

    /// Unregister an instance, returning whether it was present
    pub fn unregister(&self, module_id: &str, tenant_id: Option<&str>) -> bool {
        let instance = ModuleInstance::new(module_id, tenant_id.map(str::to_string));
        debug!(instance = %instance, "Unregistering module instance");
        self.instances.remove(&instance).is_some()
    }

    pub fn contains(&self, instance: &ModuleInstance) -> bool {
        self.instances.contains_key(instance)
    }

    /// All registered instances in a stable order
    pub fn list(&self) -> Vec<ModuleInstance> {
        let mut instances: Vec<ModuleInstance> =
            self.instances.iter().map(|r| r.key().clone()).collect();
        instances.sort();
        instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
