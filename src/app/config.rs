//! Application configuration types
//!
//! Contains the configuration structures read by the `botflow` binary.

use botflow_core::{SchedulerConfig, TriggerSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerAppConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
    #[serde(default = "default_true")]
    pub logging_enabled: bool,
}

impl Default for SchedulerAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: default_max_concurrent(),
            drain_timeout_secs: default_drain_timeout(),
            max_sleep_ms: default_max_sleep_ms(),
            logging_enabled: true,
        }
    }
}

impl SchedulerAppConfig {
    /// Engine configuration for these settings
    pub fn engine_config(&self) -> SchedulerConfig {
        SchedulerConfig::new()
            .with_max_concurrent(self.max_concurrent)
            .with_drain_timeout(self.drain_timeout_secs)
            .with_max_sleep(std::time::Duration::from_millis(self.max_sleep_ms))
            .with_logging(self.logging_enabled)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    10
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_max_sleep_ms() -> u64 {
    60_000
}

/// A configured job: handler, parameters and when to run it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub handler: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Absent means run once at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerSpec>,
}
