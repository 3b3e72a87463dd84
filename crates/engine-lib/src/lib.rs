//! Module resource and health orchestration engine
//!
//! This crate provides the core functionality for:
//! - Per-module, per-tenant usage ledgers with limits and derived metrics
//! - Usage pattern analysis and scaling decisions
//! - Weighted health checks with automated recovery
//! - Tenant module load-state optimization

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod optimizer;
pub mod scaling;
pub mod stats;

pub use config::EngineConfig;
pub use engine::{EngineBuilder, ModuleEngine};
pub use error::{EngineError, Result};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
