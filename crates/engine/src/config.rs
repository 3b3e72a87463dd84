//! Daemon configuration

use anyhow::{Context, Result};
use engine_lib::EngineConfig;
use serde::Deserialize;

/// Path to an optional configuration file
const CONFIG_FILE_VAR: &str = "ENGINE_CONFIG_FILE";

/// Daemon configuration
///
/// Read from an optional file named by `ENGINE_CONFIG_FILE`, then from
/// `ENGINE_*` environment variables. Nested keys use `__`, for example
/// `ENGINE_ENGINE__MONITOR_INTERVAL_MS=5000`.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Port for the health/metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Instances to monitor from startup, as `module` or `module@tenant`
    #[serde(default)]
    pub instances: Vec<String>,

    /// Uptime reported for every instance by the ledger-backed source
    #[serde(default = "default_uptime_percent")]
    pub uptime_percent: f64,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_api_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_uptime_percent() -> f64 {
    100.0
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            instances: Vec::new(),
            uptime_percent: default_uptime_percent(),
            engine: EngineConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_VAR) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("ENGINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("instances"),
            )
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid daemon configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }

    /// Parse `instances` into (module, tenant) pairs, skipping blanks
    pub fn parsed_instances(&self) -> Vec<(String, Option<String>)> {
        self.instances
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(|raw| match raw.split_once('@') {
                Some((module, tenant)) if !tenant.trim().is_empty() => {
                    (module.trim().to_string(), Some(tenant.trim().to_string()))
                }
                Some((module, _)) => (module.trim().to_string(), None),
                None => (raw.to_string(), None),
            })
            .collect()
    }
}
