//! Tenant module subscriptions
//!
//! The optimizer only classifies modules a tenant is subscribed to; where
//! that list comes from is up to the host application.

use dashmap::DashMap;

/// Capability interface for tenant subscriptions
pub trait SubscriptionSource: Send + Sync {
    /// Subscribed module ids for a tenant, in display order
    fn subscriptions(&self, tenant_id: &str) -> Vec<String>;
}

/// Subscriptions held in memory
#[derive(Default)]
pub struct InMemorySubscriptions {
    tenants: DashMap<String, Vec<String>>,
}

impl InMemorySubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a tenant's subscriptions, dropping duplicates
    pub fn set(&self, tenant_id: &str, modules: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(modules.len());
        for module in modules {
            if !unique.contains(&module) {
                unique.push(module);
            }
        }
        self.tenants.insert(tenant_id.to_string(), unique);
    }

    pub fn subscribe(&self, tenant_id: &str, module_id: &str) {
        let mut modules = self.tenants.entry(tenant_id.to_string()).or_default();
        if !modules.iter().any(|m| m == module_id) {
            modules.push(module_id.to_string());
        }
    }

    pub fn unsubscribe(&self, tenant_id: &str, module_id: &str) -> bool {
        match self.tenants.get_mut(tenant_id) {
            Some(mut modules) => {
                let before = modules.len();
                modules.retain(|m| m != module_id);
                modules.len() != before
            }
            None => false,
        }
    }
}

impl SubscriptionSource for InMemorySubscriptions {
    fn subscriptions(&self, tenant_id: &str) -> Vec<String> {
        self.tenants
            .get(tenant_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}
