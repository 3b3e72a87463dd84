//! Tenant module load-state optimization

pub mod invocations;
pub mod subscriptions;
pub mod tenant;

pub use invocations::{InvocationLog, MAX_INVOCATIONS_PER_MODULE};
pub use subscriptions::{InMemorySubscriptions, SubscriptionSource};
pub use tenant::TenantModuleOptimizer;
